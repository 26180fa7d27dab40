pub mod action_writer;
pub mod transfer_reader;
