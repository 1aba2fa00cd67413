//! The slice of the page DOM the relay reads.

/// A `<link>` element whose `rel` contains "icon".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconLink {
    pub rel: String,
    pub href: String,
    pub sizes: Option<String>,
}

impl IconLink {
    pub fn new(href: impl Into<String>, sizes: Option<&str>) -> Self {
        Self {
            rel: "icon".to_string(),
            href: href.into(),
            sizes: sizes.map(str::to_string),
        }
    }
}

/// Read access to the page document.
///
/// The relay only calls this when it enriches a connection-type request.
pub trait PageDocument: Send + Sync {
    fn title(&self) -> String;

    /// Equivalent of `querySelectorAll("link[rel*='icon']")`.
    fn icon_links(&self) -> Vec<IconLink>;
}

/// A fixed document, used by embedders that snapshot the DOM and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
    pub title: String,
    pub links: Vec<IconLink>,
}

impl StaticDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            links: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: IconLink) -> Self {
        self.links.push(link);
        self
    }
}

impl PageDocument for StaticDocument {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn icon_links(&self) -> Vec<IconLink> {
        self.links
            .iter()
            .filter(|link| link.rel.contains("icon"))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_filter_matches_substring() {
        let doc = StaticDocument::new("Dapp")
            .with_link(IconLink::new("/a.png", Some("16x16")))
            .with_link(IconLink {
                rel: "apple-touch-icon".into(),
                href: "/b.png".into(),
                sizes: None,
            })
            .with_link(IconLink {
                rel: "stylesheet".into(),
                href: "/c.css".into(),
                sizes: None,
            });

        let hrefs: Vec<_> = doc.icon_links().into_iter().map(|l| l.href).collect();
        assert_eq!(hrefs, vec!["/a.png", "/b.png"]);
    }
}
