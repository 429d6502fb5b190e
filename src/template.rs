//! Message rendering for build and job notifications.
//!
//! Event fields are substituted into three built-in templates powered by
//! minijinja:
//!
//! - the subject line and the plain-text body, rendered verbatim;
//! - the HTML body, rendered with HTML auto-escape so that commit messages,
//!   file names or repository names can never inject markup into the email.
//!
//! # Example
//!
//! ```ignore
//! use buildmail::template::TemplateEngine;
//!
//! let engine = TemplateEngine::new("Screwdriver");
//! let content = engine.render(&payload, StatusName::Failure)?;
//! println!("{}", content.subject);
//! ```

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;

use crate::error::TemplateError;
use crate::event::EventPayload;
use crate::status::StatusName;

/// Product name used in subjects when none is configured.
pub const DEFAULT_PRODUCT_NAME: &str = "Screwdriver";

/// Shown instead of the file list when a commit reports no changed files.
pub const NO_CHANGED_FILES: &str = "No changed files found.";

/// Number of commit SHA characters shown in messages.
pub const SHORT_SHA_LEN: usize = 7;

const SUBJECT_TEMPLATE: &str = "{{ status }} - {{ product }} {{ repo }} {{ job }} {{ root_dir }}\
{% if build_id %} #{{ build_id }}{% endif %}";

const TEXT_TEMPLATE: &str = "\
{% if kind == 'job_status' %}Job status: {{ status }}
Pipeline: {{ repo }}
Job: {{ job }}
{% if message %}Message: {{ message }}
{% endif %}Pipeline link: {{ link }}
{% else %}Build status: {{ status }}
Build link: {{ link }}
{% if commit_message %}
Commit: {{ sha }} {{ commit_message }}
{% endif %}{% endif %}";

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<body style="font-family: Helvetica, Arial, sans-serif; color: #333333;">
<table cellpadding="4" cellspacing="0" style="border-collapse: collapse;">
<tr><td colspan="2" style="border-left: 6px solid {{ color }}; padding-left: 12px;">
<h2 style="margin: 0;">{{ status }}</h2>
<p style="margin: 4px 0 0 0;">{{ description }}</p>
</td></tr>
<tr><td><strong>Pipeline</strong></td><td>{{ repo }}{% if root_dir %} ({{ root_dir }}){% endif %}</td></tr>
<tr><td><strong>Job</strong></td><td>{{ job }}</td></tr>
{% if kind == 'job_status' %}
{% if message %}<tr><td><strong>Message</strong></td><td>{{ message }}</td></tr>{% endif %}
<tr><td><strong>Pipeline link</strong></td><td>{% if link_href %}<a href="{{ link_href }}">{{ link }}</a>{% else %}{{ link }}{% endif %}</td></tr>
{% else %}
<tr><td><strong>Build</strong></td><td>{% if link_href %}<a href="{{ link_href }}">#{{ build_id }}</a>{% else %}#{{ build_id }}{% endif %}</td></tr>
<tr><td><strong>Commit</strong></td><td>{% if commit_href %}<a href="{{ commit_href }}">{{ sha }}</a>{% else %}{{ sha }}{% endif %} {{ commit_message }}</td></tr>
<tr><td valign="top"><strong>Changed files</strong></td><td>
{% if changed_files %}<ul>
{% for file in changed_files %}<li>{{ file }}</li>
{% endfor %}</ul>{% else %}{{ no_changed_files }}{% endif %}
</td></tr>
{% endif %}
</table>
</body>
</html>
"#;

/// Subject and bodies rendered for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl RenderedContent {
    /// Address the content, producing the message handed to the transport.
    pub fn addressed(self, from: impl Into<String>, to: Vec<String>) -> RenderedMessage {
        RenderedMessage {
            from: from.into(),
            to,
            subject: self.subject,
            text: self.text,
            html: self.html,
        }
    }
}

/// Message ready for the mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Values available to the templates.
#[derive(Debug, Serialize)]
struct MessageContext<'a> {
    kind: &'static str,
    status: &'static str,
    color: &'static str,
    description: &'static str,
    product: &'a str,
    repo: &'a str,
    job: &'a str,
    root_dir: &'a str,
    build_id: &'a str,
    link: &'a str,
    /// `link` when it is an http(s) URL, otherwise empty.
    link_href: &'a str,
    sha: &'a str,
    commit_message: &'a str,
    commit_href: &'a str,
    changed_files: Vec<&'a str>,
    no_changed_files: &'static str,
    message: &'a str,
}

/// Renders notification content for events.
///
/// The built-in templates are compiled once into two environments: one
/// without escaping for the subject and text body, one with HTML auto-escape
/// for the HTML body.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    product_name: String,
    plain_env: Environment<'static>,
    html_env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine that names `product_name` in every subject.
    pub fn new(product_name: impl Into<String>) -> Self {
        let mut plain_env = Environment::new();
        plain_env.set_undefined_behavior(UndefinedBehavior::Lenient);
        plain_env.set_auto_escape_callback(|_| AutoEscape::None);
        add_builtin(&mut plain_env, "subject", SUBJECT_TEMPLATE);
        add_builtin(&mut plain_env, "text", TEXT_TEMPLATE);

        let mut html_env = Environment::new();
        html_env.set_undefined_behavior(UndefinedBehavior::Lenient);
        html_env.set_auto_escape_callback(|_| AutoEscape::Html);
        add_builtin(&mut html_env, "html", HTML_TEMPLATE);

        Self {
            product_name: product_name.into(),
            plain_env,
            html_env,
        }
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    /// Render subject, text and HTML for `event` under `effective_status`.
    ///
    /// Missing optional fields render as empty segments.
    pub fn render(
        &self,
        event: &EventPayload,
        effective_status: StatusName,
    ) -> Result<RenderedContent, TemplateError> {
        let ctx = self.context(event, effective_status);

        let subject = collapse_whitespace(&render(&self.plain_env, "subject", &ctx)?);
        let text = render(&self.plain_env, "text", &ctx)?;
        let html = render(&self.html_env, "html", &ctx)?;

        tracing::trace!(
            subject_len = subject.len(),
            text_len = text.len(),
            html_len = html.len(),
            "Template rendered successfully"
        );

        Ok(RenderedContent {
            subject,
            text,
            html,
        })
    }

    fn context<'a>(&'a self, event: &'a EventPayload, status: StatusName) -> MessageContext<'a> {
        let pipeline = event.pipeline();
        let mut ctx = MessageContext {
            kind: event.kind().as_str(),
            status: status.as_str(),
            color: status.color(),
            description: status.description(),
            product: &self.product_name,
            repo: pipeline.repo_name(),
            job: event.job_name(),
            root_dir: pipeline.root_dir(),
            build_id: "",
            link: "",
            link_href: "",
            sha: "",
            commit_message: "",
            commit_href: "",
            changed_files: Vec::new(),
            no_changed_files: NO_CHANGED_FILES,
            message: "",
        };

        match event {
            EventPayload::Build(build) => {
                let commit = &build.build.meta.commit;
                ctx.build_id = build.build.id.as_deref().unwrap_or_default();
                ctx.link = build.build_link.as_deref().unwrap_or_default();
                ctx.sha = short_sha(build.build.meta.build.sha.as_deref().unwrap_or_default());
                ctx.commit_message = commit.message.as_deref().unwrap_or_default();
                ctx.commit_href = web_url(commit.url.as_deref().unwrap_or_default());
                ctx.changed_files =
                    split_changed_files(commit.changed_files.as_deref().unwrap_or_default());
            }
            EventPayload::Job(job) => {
                ctx.link = job.pipeline_link.as_deref().unwrap_or_default();
                ctx.message = job.message.as_deref().unwrap_or_default();
            }
        }
        ctx.link_href = web_url(ctx.link);

        ctx
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PRODUCT_NAME)
    }
}

/// Split a comma-joined file list. Blank entries are dropped, so an empty
/// string yields no files.
pub fn split_changed_files(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// First [`SHORT_SHA_LEN`] characters of a commit SHA.
pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(SHORT_SHA_LEN) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// `url` if it uses the http or https scheme, otherwise an empty string.
/// Keeps `javascript:` and similar schemes out of `href` attributes.
pub fn web_url(url: &str) -> &str {
    let url = url.trim();
    let is_web = ["http://", "https://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });
    if is_web { url } else { "" }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A broken built-in template surfaces as a render error on first use.
fn add_builtin(env: &mut Environment<'static>, name: &'static str, source: &'static str) {
    if let Err(e) = env.add_template(name, source) {
        tracing::error!(template = name, error = %e, "Built-in template failed to compile");
    }
}

fn render(
    env: &Environment<'static>,
    name: &str,
    ctx: &MessageContext<'_>,
) -> Result<String, TemplateError> {
    env.get_template(name)
        .and_then(|template| template.render(ctx))
        .map_err(|e| TemplateError::RenderFailed {
            message: e.to_string(),
        })
}
