//! HTML widgets for settings nodes.
//!
//! A widget turns one node into markup for the settings page. Container
//! widgets render their children and skip the ones without a widget, so a
//! single stub element never breaks the whole form.

use std::fmt;

use crate::settings::error::{SettingsError, SettingsResult};
use crate::settings::node::SettingsNode;

/// Renders a settings node to HTML.
pub trait Widget: Send + Sync + fmt::Debug {
    fn render(&self, node: &SettingsNode) -> SettingsResult<String>;
}

/// HTML id derived from the node's fqid.
pub fn html_id(node: &SettingsNode) -> String {
    format!("id_{}", escape(node.fqid()))
}

/// Escape text for use in element content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Text input with a label.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextWidget;

impl Widget for TextWidget {
    fn render(&self, node: &SettingsNode) -> SettingsResult<String> {
        let id = html_id(node);
        Ok(format!(
            "<input type=\"text\" id=\"{id}\" name=\"{name}\" value=\"{value}\" />\n\
             <label for=\"{id}\">{label}</label>",
            name = escape(node.fqid()),
            value = escape(node.value()),
            label = escape(node.label()),
        ))
    }
}

/// Select box listing the node's choices.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectWidget;

impl Widget for SelectWidget {
    fn render(&self, node: &SettingsNode) -> SettingsResult<String> {
        let mut html = format!(
            "<select id=\"{}\" name=\"{}\">\n",
            html_id(node),
            escape(node.fqid())
        );

        for choice in node.choices() {
            match choice.render() {
                Ok(option) if choice.key() == node.value() => {
                    html.push_str(&option.replacen("<option ", "<option selected ", 1));
                    html.push('\n');
                }
                Ok(option) => {
                    html.push_str(&option);
                    html.push('\n');
                }
                Err(SettingsError::NotRenderable(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        html.push_str("</select>");
        Ok(html)
    }
}

/// One option of a select box. Expects to be attached to a choice node.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptionWidget;

impl Widget for OptionWidget {
    fn render(&self, node: &SettingsNode) -> SettingsResult<String> {
        Ok(format!(
            "<option id=\"{}\" value=\"{}\">{}</option>",
            html_id(node),
            escape(node.key()),
            escape(node.label())
        ))
    }
}

/// Section with a heading that renders every renderable child.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubtreeWidget;

impl Widget for SubtreeWidget {
    fn render(&self, node: &SettingsNode) -> SettingsResult<String> {
        let mut html = format!(
            "<div id=\"div_{}\">\n<h2>{}</h2>\n",
            escape(node.fqid()),
            escape(node.label())
        );

        for child in node.children() {
            match child.render() {
                Ok(inner) => {
                    html.push_str("<div class=\"input_field col\">\n");
                    html.push_str(&inner);
                    html.push_str("\n</div>\n");
                }
                Err(SettingsError::NotRenderable(fqid)) => {
                    tracing::trace!(fqid = %fqid, "Skipping setting without widget");
                }
                Err(e) => return Err(e),
            }
        }

        html.push_str("</div>\n");
        Ok(html)
    }
}
