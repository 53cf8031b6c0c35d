pub mod chromium;
pub mod connection;
pub mod driver;

pub use chromium::{ChromiumBrowser, ChromiumTab};
pub use connection::open_browser;
pub use driver::{BrowserDriver, Element, Tab};
