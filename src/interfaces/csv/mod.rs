pub mod order_reader;
pub mod response_writer;
