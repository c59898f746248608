pub mod background;
pub mod walk;

pub use background::{DirectoryScanner, ScanMessage};
pub use walk::{collect_images, scan_directory};
