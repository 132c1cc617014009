// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gadget Definition Fetcher
//!
//! Downloads a remote gadget XML document and extracts the `ModulePrefs`
//! attributes the portal records (title, description, author).
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Implement the [`GadgetDefinitionFetcher`] port over HTTP
//! - **Integration:** Remote gadget host → `GadgetDefinition` → lifecycle service
//!
//! Only the `<Module>` envelope and the attributes of its `<ModulePrefs>`
//! element are read; gadget content sections are ignored.

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::definition::{FetchError, GadgetDefinition, GadgetDefinitionFetcher};

pub struct HttpGadgetDefinitionFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpGadgetDefinitionFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl GadgetDefinitionFetcher for HttpGadgetDefinitionFetcher {
    async fn fetch(&self, url: &str) -> Result<GadgetDefinition, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                parsed.scheme(),
                url
            )));
        }

        debug!(url, "Fetching gadget definition");
        let response = self.client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout_ms())
            } else {
                FetchError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout_ms())
            } else {
                FetchError::Unreachable(e.to_string())
            }
        })?;

        parse_gadget_xml(&body)
    }
}

/// Extract the `ModulePrefs` attributes from a gadget XML document
pub fn parse_gadget_xml(xml: &str) -> Result<GadgetDefinition, FetchError> {
    let module = Regex::new(r"<Module[\s>]").map_err(|e| FetchError::Malformed(e.to_string()))?;
    if !module.is_match(xml) {
        return Err(FetchError::Malformed("missing <Module> element".to_string()));
    }

    let prefs = Regex::new(r"(?s)<ModulePrefs\b([^>]*?)/?>")
        .map_err(|e| FetchError::Malformed(e.to_string()))?;
    let attributes = prefs
        .captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| FetchError::Malformed("missing <ModulePrefs> element".to_string()))?;

    let attribute = Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .map_err(|e| FetchError::Malformed(e.to_string()))?;
    let values: HashMap<&str, String> = attribute
        .captures_iter(attributes)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((name, unescape(value)))
        })
        .collect();

    let non_blank = |name: &str| values.get(name).filter(|v| !v.trim().is_empty()).cloned();

    Ok(GadgetDefinition {
        title: values.get("title").cloned().unwrap_or_default(),
        description: non_blank("description"),
        author: non_blank("author"),
    })
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOCK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Module>
  <ModulePrefs title="World Clock &amp; Timer"
               description='Shows the time'
               author="Ada">
    <Require feature="opensocial-0.8"/>
  </ModulePrefs>
  <Content type="html"><![CDATA[<div id="clock"></div>]]></Content>
</Module>"#;

    #[test]
    fn test_parse_module_prefs() {
        let definition = parse_gadget_xml(CLOCK).unwrap();
        assert_eq!(definition.title, "World Clock & Timer");
        assert_eq!(definition.description.as_deref(), Some("Shows the time"));
        assert_eq!(definition.author.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_missing_title_falls_back_to_url() {
        let definition = parse_gadget_xml("<Module><ModulePrefs/></Module>").unwrap();
        assert_eq!(definition.title, "");
        assert_eq!(definition.display_name("http://example.com/g.xml"), "http://example.com/g.xml");
    }

    #[test]
    fn test_rejects_non_gadget_documents() {
        assert!(matches!(
            parse_gadget_xml("<html><body>nope</body></html>"),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_gadget_xml("<Module><Content/></Module>"),
            Err(FetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/clock.xml")
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(CLOCK)
            .create_async()
            .await;

        let fetcher = HttpGadgetDefinitionFetcher::new(Duration::from_secs(5)).unwrap();
        let definition = fetcher
            .fetch(&format!("{}/clock.xml", server.url()))
            .await
            .unwrap();

        assert_eq!(definition.title, "World Clock & Timer");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_maps_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.xml")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpGadgetDefinitionFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing.xml", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let err = fetcher.fetch("ftp://example.com/g.xml").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
