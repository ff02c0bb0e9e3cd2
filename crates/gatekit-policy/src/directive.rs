//! CSP directive names.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// CSP directive. The set is a fixed enumeration; an unknown directive name
/// is a programming error, not a runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    DefaultSrc,
    ScriptSrc,
    ScriptSrcElem,
    ScriptSrcAttr,
    StyleSrc,
    ImgSrc,
    FontSrc,
    ConnectSrc,
    MediaSrc,
    WorkerSrc,
    FrameSrc,
    ObjectSrc,
    FormAction,
    BaseUri,
    RequireTrustedTypesFor,
    TrustedTypes,
    ReportUri,
}

impl Directive {
    /// The header name of this directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::DefaultSrc => "default-src",
            Directive::ScriptSrc => "script-src",
            Directive::ScriptSrcElem => "script-src-elem",
            Directive::ScriptSrcAttr => "script-src-attr",
            Directive::StyleSrc => "style-src",
            Directive::ImgSrc => "img-src",
            Directive::FontSrc => "font-src",
            Directive::ConnectSrc => "connect-src",
            Directive::MediaSrc => "media-src",
            Directive::WorkerSrc => "worker-src",
            Directive::FrameSrc => "frame-src",
            Directive::ObjectSrc => "object-src",
            Directive::FormAction => "form-action",
            Directive::BaseUri => "base-uri",
            Directive::RequireTrustedTypesFor => "require-trusted-types-for",
            Directive::TrustedTypes => "trusted-types",
            Directive::ReportUri => "report-uri",
        }
    }
}

// Directives sort by header name so serialization is lexicographic.
impl Ord for Directive {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Directive {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Directive {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default-src" => Ok(Directive::DefaultSrc),
            "script-src" => Ok(Directive::ScriptSrc),
            "script-src-elem" => Ok(Directive::ScriptSrcElem),
            "script-src-attr" => Ok(Directive::ScriptSrcAttr),
            "style-src" => Ok(Directive::StyleSrc),
            "img-src" => Ok(Directive::ImgSrc),
            "font-src" => Ok(Directive::FontSrc),
            "connect-src" => Ok(Directive::ConnectSrc),
            "media-src" => Ok(Directive::MediaSrc),
            "worker-src" => Ok(Directive::WorkerSrc),
            "frame-src" => Ok(Directive::FrameSrc),
            "object-src" => Ok(Directive::ObjectSrc),
            "form-action" => Ok(Directive::FormAction),
            "base-uri" => Ok(Directive::BaseUri),
            "require-trusted-types-for" => Ok(Directive::RequireTrustedTypesFor),
            "trusted-types" => Ok(Directive::TrustedTypes),
            "report-uri" => Ok(Directive::ReportUri),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_names() {
        for d in [
            Directive::DefaultSrc,
            Directive::ScriptSrcElem,
            Directive::RequireTrustedTypesFor,
            Directive::ReportUri,
        ] {
            assert_eq!(Directive::from_str(d.as_str()), Ok(d));
        }
        assert!(Directive::from_str("sandbox").is_err());
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(Directive::ConnectSrc < Directive::DefaultSrc);
        assert!(Directive::ScriptSrc < Directive::ScriptSrcAttr);
        assert!(Directive::ScriptSrcAttr < Directive::ScriptSrcElem);
    }
}
