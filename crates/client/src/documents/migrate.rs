//! Inline image migration.
//!
//! Hosts sometimes persist images as base64 `data:` URLs directly inside
//! document JSON, which bloats the database and defeats deduplication. The
//! migrator walks a document's known image fields, uploads any inline image
//! it finds, and replaces the field with the stored asset's URL. Content
//! addressing makes this idempotent: the same bytes always land at the same
//! name, and registration short-circuits the transfer when they are already
//! stored.

use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use futures::future::join_all;
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::{debug, warn};

use crate::documents::{
    ActorDoc, DocumentKind, DocumentNode, IconDoc, ItemDoc, JournalEntryDoc, JournalPageDoc,
    NoteDoc, SceneDoc, TextureRefDoc, TokenDoc, UserDoc,
};
use crate::etag::etag_from_bytes;
use crate::transfer::AssetUploader;

const DATA_IMAGE_PREFIX: &str = "data:image/";

/// Media parameter strings longer than this are not images we produce or
/// understand; leave them alone.
const MAX_MEDIA_PARAMS_LEN: usize = 15;

fn src_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"src=("[^"]+"|'[^']+')"#).unwrap())
}

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").unwrap())
}

/// An inline `data:image/...` URL split into its parts.
struct InlineImage<'a> {
    /// Image subtype, used as the file extension ("png", "svg+xml", ...).
    subtype: &'a str,
    base64: bool,
    payload: &'a str,
}

impl InlineImage<'_> {
    fn parse(value: &str) -> Option<InlineImage<'_>> {
        let rest = value.strip_prefix(DATA_IMAGE_PREFIX)?;
        let (params, payload) = rest.split_once(',')?;
        if params.is_empty() || params.len() > MAX_MEDIA_PARAMS_LEN {
            return None;
        }
        let (subtype, base64) = match params.split_once(';') {
            Some((subtype, encoding)) => (subtype, encoding == "base64"),
            None => (params, false),
        };
        Some(InlineImage {
            subtype,
            base64,
            payload,
        })
    }

    fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.base64 {
            BASE64.decode(self.payload)
        } else {
            Ok(percent_decode_str(self.payload).collect())
        }
    }
}

/// Rewrites inline data-URL images in documents to stored asset URLs.
pub struct ImageMigrator {
    uploader: Arc<AssetUploader>,
}

impl ImageMigrator {
    pub fn new(uploader: Arc<AssetUploader>) -> Self {
        Self { uploader }
    }

    /// Migrate every known image field of `node`, returning the rewritten
    /// document. Fields that are not inline images pass through unchanged,
    /// as does any field whose upload fails.
    pub async fn migrate(&self, node: DocumentNode) -> DocumentNode {
        match node {
            DocumentNode::Actor(doc) => DocumentNode::Actor(self.migrate_actor(doc).await),
            DocumentNode::Token(doc) => {
                DocumentNode::Token(self.migrate_token(DocumentKind::Token, doc).await)
            }
            DocumentNode::Item(doc) => DocumentNode::Item(self.migrate_item(doc).await),
            DocumentNode::Scene(doc) => DocumentNode::Scene(self.migrate_scene(doc).await),
            DocumentNode::JournalEntry(doc) => {
                DocumentNode::JournalEntry(self.migrate_journal(doc).await)
            }
            DocumentNode::JournalEntryPage(doc) => {
                DocumentNode::JournalEntryPage(self.migrate_page(doc).await)
            }
            DocumentNode::Macro(doc) => {
                DocumentNode::Macro(self.migrate_icon(DocumentKind::Macro, doc).await)
            }
            DocumentNode::Tile(doc) => {
                DocumentNode::Tile(self.migrate_icon(DocumentKind::Tile, doc).await)
            }
            DocumentNode::RollTable(doc) => {
                DocumentNode::RollTable(self.migrate_icon(DocumentKind::RollTable, doc).await)
            }
            DocumentNode::Drawing(doc) => DocumentNode::Drawing(
                self.migrate_texture_ref(DocumentKind::Drawing, doc).await,
            ),
            DocumentNode::MeasuredTemplate(doc) => DocumentNode::MeasuredTemplate(
                self.migrate_texture_ref(DocumentKind::MeasuredTemplate, doc)
                    .await,
            ),
            DocumentNode::Note(doc) => DocumentNode::Note(self.migrate_note(doc).await),
            DocumentNode::User(doc) => DocumentNode::User(self.migrate_user(doc).await),
        }
    }

    async fn migrate_actor(&self, mut doc: ActorDoc) -> ActorDoc {
        doc.img = self.migrate_field(DocumentKind::Actor, doc.img).await;
        if let Some(token) = doc.prototype_token.take() {
            doc.prototype_token = Some(self.migrate_token(DocumentKind::Token, token).await);
        } else if let Some(token) = doc.token.take() {
            doc.token = Some(self.migrate_token(DocumentKind::Token, token).await);
        }
        if let Some(items) = doc.items.take() {
            doc.items = Some(join_all(items.into_iter().map(|item| self.migrate_item(item))).await);
        }
        if let Some(biography) = doc
            .system
            .as_mut()
            .or(doc.data.as_mut())
            .and_then(|s| s.details.as_mut())
            .and_then(|d| d.biography.as_mut())
        {
            biography.value = self
                .migrate_html(DocumentKind::Actor, biography.value.take())
                .await;
        }
        doc
    }

    async fn migrate_token(&self, kind: DocumentKind, mut doc: TokenDoc) -> TokenDoc {
        if let Some(texture) = doc.texture.as_mut() {
            texture.src = self.migrate_field(kind, texture.src.take()).await;
        } else {
            doc.img = self.migrate_field(kind, doc.img.take()).await;
        }
        doc
    }

    async fn migrate_item(&self, mut doc: ItemDoc) -> ItemDoc {
        doc.img = self.migrate_field(DocumentKind::Item, doc.img).await;
        if let Some(description) = doc
            .system
            .as_mut()
            .or(doc.data.as_mut())
            .and_then(|s| s.description.as_mut())
        {
            description.value = self
                .migrate_html(DocumentKind::Item, description.value.take())
                .await;
        }
        doc
    }

    async fn migrate_scene(&self, mut doc: SceneDoc) -> SceneDoc {
        if let Some(background) = doc.background.as_mut() {
            background.src = self
                .migrate_field(DocumentKind::Scene, background.src.take())
                .await;
        } else {
            doc.img = self.migrate_field(DocumentKind::Scene, doc.img.take()).await;
        }
        doc.foreground = self
            .migrate_field(DocumentKind::Scene, doc.foreground)
            .await;
        doc.thumb = self.migrate_field(DocumentKind::Scene, doc.thumb).await;
        doc.description = self
            .migrate_html(DocumentKind::Scene, doc.description)
            .await;
        if let Some(drawings) = doc.drawings.take() {
            doc.drawings = Some(
                join_all(
                    drawings
                        .into_iter()
                        .map(|d| self.migrate_texture_ref(DocumentKind::Drawing, d)),
                )
                .await,
            );
        }
        if let Some(notes) = doc.notes.take() {
            doc.notes = Some(join_all(notes.into_iter().map(|n| self.migrate_note(n))).await);
        }
        if let Some(templates) = doc.templates.take() {
            doc.templates = Some(
                join_all(
                    templates
                        .into_iter()
                        .map(|t| self.migrate_texture_ref(DocumentKind::MeasuredTemplate, t)),
                )
                .await,
            );
        }
        if let Some(tiles) = doc.tiles.take() {
            doc.tiles = Some(
                join_all(
                    tiles
                        .into_iter()
                        .map(|t| self.migrate_icon(DocumentKind::Tile, t)),
                )
                .await,
            );
        }
        if let Some(tokens) = doc.tokens.take() {
            doc.tokens = Some(
                join_all(
                    tokens
                        .into_iter()
                        .map(|t| self.migrate_token(DocumentKind::Token, t)),
                )
                .await,
            );
        }
        doc
    }

    async fn migrate_journal(&self, mut doc: JournalEntryDoc) -> JournalEntryDoc {
        if let Some(pages) = doc.pages.take() {
            doc.pages = Some(join_all(pages.into_iter().map(|p| self.migrate_page(p))).await);
        } else {
            doc.img = self.migrate_field(DocumentKind::JournalEntry, doc.img).await;
            doc.content = self
                .migrate_html(DocumentKind::JournalEntry, doc.content)
                .await;
        }
        doc
    }

    async fn migrate_page(&self, mut doc: JournalPageDoc) -> JournalPageDoc {
        let kind = DocumentKind::JournalEntryPage;
        doc.src = self.migrate_field(kind, doc.src).await;
        if let Some(text) = doc.text.as_mut() {
            text.content = self.migrate_html(kind, text.content.take()).await;
            text.markdown = self.migrate_markdown(kind, text.markdown.take()).await;
        }
        doc
    }

    async fn migrate_icon(&self, kind: DocumentKind, mut doc: IconDoc) -> IconDoc {
        doc.img = self.migrate_field(kind, doc.img).await;
        doc
    }

    async fn migrate_texture_ref(&self, kind: DocumentKind, mut doc: TextureRefDoc) -> TextureRefDoc {
        doc.texture = self.migrate_field(kind, doc.texture).await;
        doc
    }

    async fn migrate_note(&self, mut doc: NoteDoc) -> NoteDoc {
        doc.icon = self.migrate_field(DocumentKind::Note, doc.icon).await;
        doc
    }

    async fn migrate_user(&self, mut doc: UserDoc) -> UserDoc {
        doc.avatar = self.migrate_field(DocumentKind::User, doc.avatar).await;
        doc
    }

    async fn migrate_field(&self, kind: DocumentKind, value: Option<String>) -> Option<String> {
        match value {
            Some(value) => Some(self.resolve_inline(kind, value).await),
            None => None,
        }
    }

    /// Resolve one image value: inline data URLs are uploaded and replaced
    /// with the stored URL, anything else is returned unchanged. Upload or
    /// decode failures keep the original value.
    async fn resolve_inline(&self, kind: DocumentKind, value: String) -> String {
        let Some(inline) = InlineImage::parse(&value) else {
            return value;
        };
        let bytes = match inline.decode() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(kind = %kind, error = %err, "inline image payload did not decode");
                return value;
            }
        };
        let name = format!("{}.{}", etag_from_bytes(&bytes), inline.subtype);
        let folder = format!("base64data/{}", kind.as_str());
        let result = self.uploader.upload(&folder, &name, Bytes::from(bytes)).await;
        if !result.is_success() {
            warn!(kind = %kind, name = %name, message = %result.message,
                "inline image upload failed, keeping data URL");
            return value;
        }
        match result.path {
            Some(url) => {
                debug!(kind = %kind, url = %url, "migrated inline image");
                url
            }
            None => value,
        }
    }

    /// Rewrite every `src="..."` / `src='...'` attribute value in `content`.
    /// Non-image sources pass through `resolve_inline` untouched, so this is
    /// safe to run on arbitrary HTML.
    pub async fn migrate_html(&self, kind: DocumentKind, content: Option<String>) -> Option<String> {
        let content = content?;
        if content.is_empty() {
            return Some(content);
        }
        Some(self.rewrite_spans(kind, content, html_src_spans).await)
    }

    /// Rewrite markdown content: embedded HTML first, then the targets of
    /// `[text](url)` links. Parentheses in replacement URLs are
    /// percent-escaped so the link syntax stays parseable.
    pub async fn migrate_markdown(
        &self,
        kind: DocumentKind,
        content: Option<String>,
    ) -> Option<String> {
        let content = self.migrate_html(kind, content).await?;
        if content.is_empty() {
            return Some(content);
        }
        let rewritten = self.rewrite_spans(kind, content, markdown_target_spans).await;
        Some(rewritten)
    }

    /// Two-pass rewrite: collect the byte spans to replace, resolve their
    /// replacements concurrently, then splice them back in order.
    async fn rewrite_spans(
        &self,
        kind: DocumentKind,
        content: String,
        spans_of: fn(&str) -> Vec<Span>,
    ) -> String {
        let spans = spans_of(&content);
        if spans.is_empty() {
            return content;
        }
        let resolved = join_all(
            spans
                .iter()
                .map(|span| self.resolve_inline(kind, span.value.clone())),
        )
        .await;
        let mut out = String::with_capacity(content.len());
        let mut cursor = 0;
        for (span, replacement) in spans.iter().zip(resolved) {
            out.push_str(&content[cursor..span.start]);
            out.push_str(&(span.escape)(&replacement));
            cursor = span.end;
        }
        out.push_str(&content[cursor..]);
        out
    }
}

/// A byte range in the content to replace, the value it currently holds,
/// and how to escape the replacement.
struct Span {
    start: usize,
    end: usize,
    value: String,
    escape: fn(&str) -> String,
}

fn html_src_spans(content: &str) -> Vec<Span> {
    src_attr_re()
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|quoted| Span {
            // Keep the surrounding quotes; replace only the value.
            start: quoted.start() + 1,
            end: quoted.end() - 1,
            value: content[quoted.start() + 1..quoted.end() - 1].to_string(),
            escape: |s| s.to_string(),
        })
        .collect()
}

fn markdown_target_spans(content: &str) -> Vec<Span> {
    markdown_link_re()
        .captures_iter(content)
        .filter_map(|caps| caps.get(2))
        .map(|target| Span {
            start: target.start(),
            end: target.end(),
            value: content[target.range()].to_string(),
            escape: |s| s.replace('(', "%28").replace(')', "%29"),
        })
        .collect()
}
