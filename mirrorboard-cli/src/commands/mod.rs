pub mod daemon;
pub mod init;
pub mod parent;
pub mod select;
pub mod status;
pub mod sync;
