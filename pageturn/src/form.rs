//! Read-only view of a form submission.
//!
//! Nothing here is cached: every property is read from the form (and its
//! submitter) at the moment it is asked for, so the model reflects the state of
//! the page at submission time.

use indexmap::IndexMap;
use indextree::NodeId;
use url::Url;
use url::form_urlencoded;

use crate::dom::Document;
use crate::error::NavigateError;
use crate::observe::Directive;
use crate::platform::{FetchRequest, Method};

/// Where a form's attributes and entry list come from.
pub trait FormSource {
    /// Attribute of the `<form>` element
    fn form_attribute(&self, name: &str) -> Option<String>;

    /// Attribute of the submit button, if the submission has one
    fn submitter_attribute(&self, name: &str) -> Option<String>;

    /// The form data set, in tree order
    fn entries(&self) -> Vec<(String, String)>;

    /// True if the form owns an `<input type="file">`
    fn has_file_controls(&self) -> bool;
}

/// Value of the `method` / `formmethod` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
    /// Closes the enclosing dialog; never sent anywhere
    Dialog,
}

/// Value of the `enctype` / `formenctype` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enctype {
    UrlEncoded,
    Multipart,
    TextPlain,
}

impl Enctype {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Enctype::UrlEncoded => "application/x-www-form-urlencoded",
            Enctype::Multipart => "multipart/form-data",
            Enctype::TextPlain => "text/plain",
        }
    }
}

/// Encoded request body of a non-GET submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormBody {
    UrlEncoded(String),
    /// Entries handed to the host, which builds the multipart body itself
    Multipart(Vec<(String, String)>),
    Text(String),
}

/// A form plus its optional submitter, seen from the document at `base`.
pub struct FormModel<'a, F: FormSource> {
    source: &'a F,
    base: &'a Url,
}

impl<'a, F: FormSource> FormModel<'a, F> {
    pub fn new(source: &'a F, base: &'a Url) -> Self {
        Self { source, base }
    }

    /// Submitter attribute if present, form attribute otherwise
    fn attribute(&self, submitter: &str, form: &str) -> Option<String> {
        self.source
            .submitter_attribute(submitter)
            .or_else(|| self.source.form_attribute(form))
    }

    pub fn method(&self) -> FormMethod {
        match self
            .attribute("formmethod", "method")
            .map(|m| m.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("post") => FormMethod::Post,
            Some("dialog") => FormMethod::Dialog,
            _ => FormMethod::Get,
        }
    }

    pub fn enctype(&self) -> Enctype {
        match self
            .attribute("formenctype", "enctype")
            .map(|e| e.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("multipart/form-data") => Enctype::Multipart,
            Some("text/plain") => Enctype::TextPlain,
            _ => Enctype::UrlEncoded,
        }
    }

    /// Action URL. For GET the entries replace the query string.
    pub fn url(&self) -> Result<Url, NavigateError> {
        let action = self
            .attribute("formaction", "action")
            .filter(|a| !a.trim().is_empty());
        let mut url = match action {
            Some(action) => self.base.join(action.trim()).map_err(|_| NavigateError::InvalidUrl {
                url: action.clone(),
            })?,
            None => self.base.clone(),
        };
        if self.method() == FormMethod::Get {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(self.source.entries());
        }
        Ok(url)
    }

    /// `None` for GET submissions
    pub fn body(&self) -> Option<FormBody> {
        if self.method() != FormMethod::Post {
            return None;
        }
        let entries = self.source.entries();
        Some(match self.enctype() {
            Enctype::UrlEncoded => FormBody::UrlEncoded(
                form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(entries)
                    .finish(),
            ),
            Enctype::Multipart => FormBody::Multipart(entries),
            Enctype::TextPlain => FormBody::Text(
                entries
                    .into_iter()
                    .map(|(name, value)| format!("{name}={value}\r\n"))
                    .collect(),
            ),
        })
    }

    /// Request that performs this submission
    pub fn request(&self) -> Result<FetchRequest, NavigateError> {
        let url = self.url()?;
        Ok(match self.body() {
            Some(body) => FetchRequest {
                url,
                method: Method::Post,
                body: Some(body),
            },
            None => FetchRequest::get(url),
        })
    }

    /// Browsing context the response is meant for (`formtarget`, else `target`)
    pub fn target(&self) -> Option<String> {
        self.attribute("formtarget", "target")
    }

    /// `data-pageturn` on the submitter, else on the form
    pub fn directive(&self) -> Directive {
        Directive::parse(
            self.attribute(crate::observe::NAVIGATE_ATTRIBUTE, crate::observe::NAVIGATE_ATTRIBUTE)
                .as_deref(),
        )
    }

    pub fn has_file_controls(&self) -> bool {
        self.source.has_file_controls()
    }
}

/// A form captured as plain data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    pub attributes: IndexMap<String, String>,
    pub submitter: Option<IndexMap<String, String>>,
    pub entries: Vec<(String, String)>,
    pub has_files: bool,
}

impl FormSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_submitter_attr(mut self, name: &str, value: &str) -> Self {
        self.submitter
            .get_or_insert_with(IndexMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_entry(mut self, name: &str, value: &str) -> Self {
        self.entries.push((name.to_string(), value.to_string()));
        self
    }

    /// Capture an arena form as it is right now
    pub fn capture(form: &ArenaForm<'_>) -> Self {
        let attrs_of = |id: NodeId| form.doc.element(id).map(|e| e.attrs.clone());
        Self {
            attributes: attrs_of(form.form).unwrap_or_default(),
            submitter: form.submitter.and_then(attrs_of),
            entries: form.entries(),
            has_files: form.has_file_controls(),
        }
    }
}

impl FormSource for FormSnapshot {
    fn form_attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn submitter_attribute(&self, name: &str) -> Option<String> {
        self.submitter.as_ref()?.get(name).cloned()
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }

    fn has_file_controls(&self) -> bool {
        self.has_files
    }
}

/// A `<form>` in an arena document.
#[derive(Debug, Clone, Copy)]
pub struct ArenaForm<'a> {
    pub doc: &'a Document,
    pub form: NodeId,
    pub submitter: Option<NodeId>,
}

impl<'a> ArenaForm<'a> {
    pub fn new(doc: &'a Document, form: NodeId, submitter: Option<NodeId>) -> Self {
        Self {
            doc,
            form,
            submitter,
        }
    }

    /// Controls owned by this form, in tree order
    fn controls(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.doc.descendants().filter(move |&n| {
            matches!(
                self.doc.tag(n),
                Some("input" | "select" | "textarea" | "button")
            ) && self.doc.parent_form(n) == Some(self.form)
        })
    }

    fn input_type(&self, id: NodeId) -> String {
        self.doc
            .attr(id, "type")
            .unwrap_or("text")
            .to_ascii_lowercase()
    }

    fn select_values(&self, select: NodeId, out: &mut Vec<String>) {
        let doc = self.doc;
        let options: Vec<NodeId> = select
            .descendants(&doc.arena)
            .filter(|&n| doc.tag(n) == Some("option"))
            .collect();
        let value = |o: NodeId| {
            doc.attr(o, "value")
                .map(str::to_string)
                .unwrap_or_else(|| doc.text_content(o).trim().to_string())
        };
        let selected: Vec<NodeId> = options
            .iter()
            .copied()
            .filter(|&o| doc.attr(o, "selected").is_some() && doc.attr(o, "disabled").is_none())
            .collect();
        if selected.is_empty() {
            if doc.attr(select, "multiple").is_none()
                && let Some(&first) = options.first()
            {
                out.push(value(first));
            }
            return;
        }
        let multiple = doc.attr(select, "multiple").is_some();
        for o in selected {
            out.push(value(o));
            if !multiple {
                break;
            }
        }
    }
}

impl FormSource for ArenaForm<'_> {
    fn form_attribute(&self, name: &str) -> Option<String> {
        self.doc.attr(self.form, name).map(str::to_string)
    }

    fn submitter_attribute(&self, name: &str) -> Option<String> {
        self.doc.attr(self.submitter?, name).map(str::to_string)
    }

    fn entries(&self) -> Vec<(String, String)> {
        let doc = self.doc;
        let mut entries = Vec::new();
        for id in self.controls() {
            let Some(name) = doc.attr(id, "name").filter(|n| !n.is_empty()) else {
                continue;
            };
            if doc.attr(id, "disabled").is_some() {
                continue;
            }
            let value = |default: &str| doc.attr(id, "value").unwrap_or(default).to_string();
            match doc.tag(id) {
                Some("button") => {
                    if Some(id) == self.submitter {
                        entries.push((name.to_string(), value("")));
                    }
                }
                Some("textarea") => entries.push((name.to_string(), doc.text_content(id))),
                Some("select") => {
                    let mut values = Vec::new();
                    self.select_values(id, &mut values);
                    entries.extend(values.into_iter().map(|v| (name.to_string(), v)));
                }
                _ => match self.input_type(id).as_str() {
                    "checkbox" | "radio" => {
                        if doc.is_checked(id) {
                            entries.push((name.to_string(), value("on")));
                        }
                    }
                    "submit" | "button" => {
                        if Some(id) == self.submitter {
                            entries.push((name.to_string(), value("")));
                        }
                    }
                    "file" | "image" | "reset" => {}
                    _ => entries.push((name.to_string(), value(""))),
                },
            }
        }
        entries
    }

    fn has_file_controls(&self) -> bool {
        self.controls()
            .any(|id| self.doc.tag(id) == Some("input") && self.input_type(id) == "file")
    }
}
