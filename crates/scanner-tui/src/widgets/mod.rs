pub mod pager;
pub mod toast;
pub mod transport;
