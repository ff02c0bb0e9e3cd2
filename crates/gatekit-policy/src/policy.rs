//! The policy accumulator and its mode presets.

use std::collections::{BTreeMap, BTreeSet};

use crate::directive::Directive;
use crate::hash::generate_nonce;
use crate::source::SourceExpr;

/// Policy synthesis mode. Selects the base preset and which collection
/// rules run: Compat/Strict hash inline content, Nonce relies on a
/// per-response nonce injected into markup by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Compat,
    Nonce,
    Strict,
}

/// Report-Only derivation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportOnlyStyle {
    /// Preview a trusted-types future policy without loosening resources.
    #[default]
    Monitor,
    /// Monitor plus loosened style/img/connect sources.
    Relaxed,
}

/// A directive-keyed allow-list accumulator.
///
/// One `Policy` is created per analyzed document; nothing is shared across
/// requests. Adding an existing source is a no-op, cloning deep-copies
/// every source set, and serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    directives: BTreeMap<Directive, BTreeSet<SourceExpr>>,
}

impl Policy {
    /// An empty policy with no directives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a base policy for the given mode.
    ///
    /// For [`Mode::Nonce`] the supplied nonce is used, or a fresh one is
    /// generated when absent; the generated nonce is recoverable via
    /// [`Policy::nonce`].
    pub fn base(mode: Mode, nonce: Option<&str>) -> Policy {
        let mut policy = Policy::new();

        use Directive::*;
        use SourceExpr::*;

        policy.add(DefaultSrc, SelfSource);

        match mode {
            Mode::Compat => {
                for d in [ScriptSrc, ScriptSrcElem] {
                    policy.add(d, SelfSource);
                    policy.add(d, Scheme("https:"));
                    policy.add(d, StrictDynamic);
                }
                policy.add(ScriptSrcAttr, SelfSource);
                policy.add(StyleSrc, UnsafeInline);
                policy.add(ObjectSrc, SelfSource);
            }
            Mode::Nonce => {
                let nonce = nonce
                    .map(str::to_string)
                    .unwrap_or_else(generate_nonce);
                for d in [ScriptSrc, ScriptSrcElem] {
                    policy.add(d, SelfSource);
                    policy.add(d, Nonce(nonce.clone()));
                    policy.add(d, StrictDynamic);
                }
                policy.add(ScriptSrcAttr, SelfSource);
                policy.add(StyleSrc, UnsafeInline);
                policy.add(ObjectSrc, SelfSource);
            }
            Mode::Strict => {
                for d in [ScriptSrc, ScriptSrcElem] {
                    policy.add(d, SelfSource);
                    policy.add(d, StrictDynamic);
                }
                // script-src-attr stays empty: inline handlers are
                // forbidden outright unless a hash/nonce is added later.
                policy.directives.entry(ScriptSrcAttr).or_default();
                policy.add(ObjectSrc, NoneSource);
                policy.add(BaseUri, SelfSource);
            }
        }

        policy.add(StyleSrc, SelfSource);
        policy.add(StyleSrc, Scheme("https:"));
        for s in [SelfSource, Scheme("data:"), Scheme("blob:"), Scheme("https:")] {
            policy.add(ImgSrc, s.clone());
            policy.add(MediaSrc, s);
        }
        for s in [SelfSource, Scheme("data:"), Scheme("https:")] {
            policy.add(FontSrc, s);
        }
        policy.add(ConnectSrc, SelfSource);
        policy.add(ConnectSrc, Scheme("https:"));
        policy.add(WorkerSrc, SelfSource);
        policy.add(WorkerSrc, Scheme("blob:"));
        policy.add(FrameSrc, SelfSource);
        policy.add(FormAction, SelfSource);

        policy
    }

    /// The conservative hard-coded policy emitted when analysis fails:
    /// self plus broad https: allowances, plugins blocked.
    pub fn fallback() -> Policy {
        let mut policy = Policy::new();

        use Directive::*;
        use SourceExpr::*;

        policy.add(DefaultSrc, SelfSource);
        for d in [ScriptSrc, StyleSrc, ConnectSrc, MediaSrc] {
            policy.add(d, SelfSource);
            policy.add(d, Scheme("https:"));
        }
        policy.add(StyleSrc, UnsafeInline);
        for d in [ImgSrc, FontSrc] {
            policy.add(d, SelfSource);
            policy.add(d, Scheme("https:"));
            policy.add(d, Scheme("data:"));
        }
        policy.add(ObjectSrc, NoneSource);
        policy.add(FrameSrc, SelfSource);
        policy.add(FormAction, SelfSource);
        policy.add(BaseUri, SelfSource);

        policy
    }

    /// Add a source expression to a directive. Idempotent.
    pub fn add(&mut self, directive: Directive, source: SourceExpr) {
        self.directives.entry(directive).or_default().insert(source);
    }

    /// The sources currently collected for a directive.
    pub fn sources(&self, directive: Directive) -> Option<&BTreeSet<SourceExpr>> {
        self.directives.get(&directive)
    }

    /// Whether a directive contains a source.
    pub fn contains(&self, directive: Directive, source: &SourceExpr) -> bool {
        self.directives
            .get(&directive)
            .is_some_and(|set| set.contains(source))
    }

    /// The nonce seeded into script-src, if any.
    pub fn nonce(&self) -> Option<&str> {
        self.sources(Directive::ScriptSrc)?.iter().find_map(|s| {
            if let SourceExpr::Nonce(value) = s {
                Some(value.as_str())
            } else {
                None
            }
        })
    }

    /// Derive the Report-Only variant: a deep copy with loosened sources
    /// and trusted-types directives, used to observe what a future
    /// stricter policy would additionally block.
    pub fn report_only_variant(&self, style: ReportOnlyStyle) -> Policy {
        let mut ro = self.clone();

        use Directive::*;
        use SourceExpr::*;

        ro.add(RequireTrustedTypesFor, TrustedScript);
        ro.add(TrustedTypes, PolicyName("default".to_string()));
        ro.add(ScriptSrc, UnsafeInline);
        ro.add(ScriptSrc, UnsafeEval);
        ro.add(ScriptSrc, Scheme("data:"));
        ro.add(ScriptSrc, Scheme("https:"));

        if style == ReportOnlyStyle::Relaxed {
            ro.add(StyleSrc, UnsafeInline);
            ro.add(ImgSrc, Wildcard);
            ro.add(ConnectSrc, Scheme("https:"));
        }

        ro
    }

    /// Serialize to a header value.
    ///
    /// Directive keys render in lexicographic order, each as
    /// `<name> <space-joined tokens>;` (bare `<name>;` for an empty set),
    /// followed by a trailing `report-uri <uri>;`. Deterministic: analyzing
    /// byte-identical input twice yields byte-identical headers.
    pub fn serialize(&self, report_uri: &str) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.directives.len() + 1);
        for (directive, sources) in &self.directives {
            if sources.is_empty() {
                parts.push(format!("{};", directive.as_str()));
            } else {
                let tokens: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
                parts.push(format!("{} {};", directive.as_str(), tokens.join(" ")));
            }
        }
        parts.push(format!("report-uri {};", report_uri));
        parts.join(" ")
    }
}
