//! ページ取得の実装（HTTP / ブラウザ）

mod browser;
mod http;

pub use browser::{BrowserOptions, BrowserSession, RenderWait, RenderedFetcher};
pub use http::StaticFetcher;
