//! Service hook notifications: envelope parsing, per-event formatting and
//! interactive approval posts. Pasted-link previews live in [`previews`].

pub mod approval_posts;
mod envelope;
mod formatters;
pub mod previews;

pub use approval_posts::{ReleaseApprovalContext, RunApprovalContext};
pub use envelope::{Envelope, Markdown};
pub use formatters::{
    Formatter, RenderContext, RenderError, RenderedPost, branch_name, formatter_for, render,
};
