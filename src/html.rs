//! scraper クレート用の小さなヘルパー

use scraper::{ElementRef, Selector};

use crate::error::ScraperError;

pub(crate) fn parse_selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::Selector(format!("{}: {}", css, e)))
}

pub(crate) fn parse_optional(css: Option<&str>) -> Result<Option<Selector>, ScraperError> {
    css.map(parse_selector).transpose()
}

/// 空白を詰めたテキスト。空なら `None`
pub(crate) fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// 最初に一致した要素のテキスト
pub(crate) fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector).find_map(element_text)
}

/// 最初に一致した要素の属性値（空は `None`）
pub(crate) fn first_attr(root: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    root.select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
