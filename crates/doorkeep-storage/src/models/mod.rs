pub mod access_code;

pub use access_code::AccessCodeRow;
