pub mod google;
pub mod onwater;
