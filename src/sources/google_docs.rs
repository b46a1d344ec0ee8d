//! Google Docs source.
//!
//! Documents are fetched as HTML, either through the Drive export API or
//! from a "published to web" URL when `options.noAuth` is set, flattened
//! to text and parsed as ArchieML.

use super::{send_text, Credentials, RemoteSettings, RemoteSource};
use crate::archieml;
use crate::error::DataError;
use crate::models::SourceDescriptor;
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Node};
use serde_json::Value;
use tracing::debug;

pub struct GoogleDocsSource {
    client: Client,
    drive_api_base: String,
    credentials: Credentials,
}

impl GoogleDocsSource {
    pub fn new(client: Client, settings: &RemoteSettings) -> Self {
        Self {
            client,
            drive_api_base: settings.google_drive_api_base.trim_end_matches('/').to_string(),
            credentials: settings.credentials.clone(),
        }
    }

    async fn html_contents(&self, set: &SourceDescriptor) -> Result<String, DataError> {
        let id = set.require_source()?;

        if set.no_auth() {
            return published_contents(&self.client, id).await;
        }

        let token = self.credentials.google_access_token()?;
        let url = format!("{}/drive/v3/files/{}/export", self.drive_api_base, id);
        debug!("Exporting Google Doc {}", id);
        let request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("mimeType", "text/html")]);
        send_text(request, &url, 400).await
    }
}

#[async_trait]
impl RemoteSource for GoogleDocsSource {
    async fn fetch(&self, set: &SourceDescriptor) -> Result<Value, DataError> {
        let html = self.html_contents(set).await?;
        let text = html_to_text(&html);
        Ok(archieml::parse(&text))
    }
}

/// Fetch a "published to web" page. Any status from 300 up is an error.
pub(crate) async fn published_contents(client: &Client, url: &str) -> Result<String, DataError> {
    if !url.get(..4).map(|s| s.eq_ignore_ascii_case("http")).unwrap_or(false) {
        return Err(DataError::Config(format!(
            "published document URL does not start with \"http\": {}",
            url
        )));
    }
    debug!("Fetching published document {}", url);
    send_text(client.get(url), url, 300).await
}

/// Flatten document HTML into ArchieML-friendly text.
///
/// Paragraphs and headings end with a newline, list items become `* `
/// lines and links keep their `<a href>` markup.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let body = root
        .children()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "body")
        .unwrap_or(root);

    straighten_quotes_in_tags(&render_children(body))
}

fn render_children(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    out.push_str(&render_element(child));
                }
            }
            _ => {}
        }
    }
    out
}

fn render_element(element: ElementRef<'_>) -> String {
    match element.value().name() {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            format!("{}\n", render_children(element))
        }
        "li" => format!("* {}\n", render_children(element)),
        "a" => match element.value().attr("href") {
            Some(href) => format!(
                "<a href=\"{}\">{}</a>",
                unwrap_redirect(href),
                render_children(element)
            ),
            None => String::new(),
        },
        "div" | "span" | "ul" | "ol" | "b" | "strong" | "i" | "em" | "u" => {
            render_children(element)
        }
        _ => String::new(),
    }
}

/// Google wraps outbound links as `https://www.google.com/url?q=<target>`.
fn unwrap_redirect(href: &str) -> String {
    Url::parse(href)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "q")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

fn straighten_quotes_in_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ => {}
        }
        let c = if in_tag {
            match c {
                '\u{201C}' | '\u{201D}' => '"',
                '\u{2018}' | '\u{2019}' => '\'',
                other => other,
            }
        } else {
            c
        };
        out.push(c);
    }
    out
}
