pub mod io_util;
pub mod workspace_util;
