use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("ブラウザ初期化エラー: {0}")]
    BrowserInit(String),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("タイムアウト: {0}")]
    Timeout(String),

    #[error("JavaScript実行エラー: {0}")]
    JavaScript(String),

    #[error("HTTPクライアントエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("セレクタが不正です: {0}")]
    Selector(String),

    #[error("データベースエラー: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV出力エラー: {0}")]
    Export(#[from] csv::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl ScraperError {
    /// 取得処理の失敗（次回の実行で再試行される種類）か
    pub fn is_transient(&self) -> bool {
        match self {
            ScraperError::Navigation(_) | ScraperError::Timeout(_) | ScraperError::Http(_) => true,
            ScraperError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ScraperError::Timeout("render".into()).is_transient());
        assert!(ScraperError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!ScraperError::Config("CATALOG_URL".into()).is_transient());
        assert!(!ScraperError::Selector("div[".into()).is_transient());
    }
}
