pub mod csv;
pub mod json;
pub mod text;
pub mod transfer_list;
