pub mod browse;
pub mod migrate;
pub mod new_folder;
pub mod status;
pub mod upload;

pub use browse::Browse;
pub use migrate::Migrate;
pub use new_folder::NewFolder;
pub use status::Status;
pub use upload::Upload;
