pub mod cdp;
pub mod page;
pub mod session;
pub mod workbench;

pub use cdp::CdpClient;
pub use page::{CdpPage, PageDriver};
pub use session::{list_available_engines, BrowserEngine, BrowserSession};
