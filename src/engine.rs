//! Entry point for document analysis. All operations take the full text and
//! work in byte offsets of that text.

use tokio_util::sync::CancellationToken;

use crate::assist::{self, Hover, Proposal, Symbol};
use crate::languages::{LanguageId, language};
use crate::providers::Providers;
use crate::reconcile::{self, Problem};
use crate::yaml::Span;

#[derive(Debug, Clone, Default)]
pub struct Engine {
    providers: Providers,
}

impl Engine {
    pub fn new(providers: Providers) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn reconcile(&self, id: LanguageId, text: &str) -> Vec<Problem> {
        reconcile::reconcile(language(id), text, &self.providers)
    }

    /// `None` when `cancel` fired before the pass finished.
    pub fn reconcile_cancellable(
        &self,
        id: LanguageId,
        text: &str,
        cancel: &CancellationToken,
    ) -> Option<Vec<Problem>> {
        reconcile::reconcile_cancellable(language(id), text, &self.providers, cancel)
    }

    pub fn complete(&self, id: LanguageId, text: &str, offset: usize) -> Vec<Proposal> {
        assist::complete(language(id), text, offset, &self.providers)
    }

    pub fn hover(&self, id: LanguageId, text: &str, offset: usize) -> Option<Hover> {
        assist::hover(language(id), text, offset)
    }

    pub fn definition(&self, id: LanguageId, text: &str, offset: usize) -> Option<Span> {
        assist::definition(language(id), text, offset)
    }

    pub fn symbols(&self, id: LanguageId, text: &str) -> Vec<Symbol> {
        assist::symbols(language(id), text)
    }
}
