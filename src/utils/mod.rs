pub mod path_utils;

pub use path_utils::generate_reply_socket_path;
