pub mod connection;
pub mod headless;
pub mod page_fetcher;

pub use connection::connect_to_browser;
pub use headless::launch_headless_browser;
pub use page_fetcher::{BrowserFetcher, PageFetcher};
