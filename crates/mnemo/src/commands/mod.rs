pub mod replay;
pub mod status;
pub mod version;
