pub mod archive;
pub mod layout;

pub use archive::ArchiveAssembler;
pub use layout::JobLayout;
