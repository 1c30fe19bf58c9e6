pub mod pagination;
pub mod temp_id;
pub mod time_ago;
