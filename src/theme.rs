//! Site-wide styling: named themes whose style and script includes are
//! concatenated around the rendered content block.

use crate::error::SetupError;

/// Styling of the framework's own container div, shipped with every
/// theme.
pub const BASE_STYLE: &str = "<style>\n    div.pageloom-container {\n        padding: 1em;\n        border: 1px solid lightgrey;\n    }\n</style>";

const BOOTSTRAP_CSS: &str = "<link rel=\"stylesheet\" href=\"https://cdn.jsdelivr.net/npm/bootstrap@5.2.3/dist/css/bootstrap.min.css\" integrity=\"sha384-rbsA2VBKQhggwzxH7pPCaAqO46MgnOM80zW1RWuH61DGLwZJEdK2Kadq2F9CUG65\" crossorigin=\"anonymous\">";
const BOOTSTRAP_JS: &str = "<script src=\"https://cdn.jsdelivr.net/npm/bootstrap@5.2.3/dist/js/bootstrap.bundle.min.js\" integrity=\"sha384-kenU1KFdBIe4zVF0s0G1M5b4hcpxyD9F7jL+jjXkk+Q2h455rYXK/7HAuoJl+0I4\" crossorigin=\"anonymous\"></script>";
const JQUERY_JS: &str = "<script src=\"https://code.jquery.com/jquery-3.7.1.slim.min.js\" integrity=\"sha256-kmHvs0B+OpCW5GVHUNjv9rOmY0IvSIRcf7zGUDTDQM8=\" crossorigin=\"anonymous\"></script>";
const SKELETON_CSS: &str = "<link rel=\"stylesheet\" href=\"https://cdnjs.cloudflare.com/ajax/libs/skeleton/2.0.4/skeleton.min.css\" integrity=\"sha512-EZLkOqwILORob+p0BXZc+Vm3RgJBOe1Iq/0fiI7r/wJgzOFZMlsqTa29UEl6v6U6gsV4uIpsNZoV32YZqrCRCQ==\" crossorigin=\"anonymous\" referrerpolicy=\"no-referrer\" />";

#[derive(Debug, Clone, Copy, PartialEq, Eq,
         strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    /// Bare minimum: only the container style.
    None,
    Skeleton,
    Bootstrap,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Skeleton
    }
}

impl Theme {
    /// Parse a configured theme name; unknown names halt startup.
    pub fn from_name(name: &str) -> Result<Theme, SetupError> {
        name.parse()
            .map_err(|_| SetupError::UnknownTheme(name.to_string()))
    }

    pub fn styles(self) -> &'static [&'static str] {
        match self {
            Theme::None => &[BASE_STYLE],
            Theme::Skeleton => &[BASE_STYLE, SKELETON_CSS],
            Theme::Bootstrap => &[BASE_STYLE, BOOTSTRAP_CSS],
        }
    }

    pub fn scripts(self) -> &'static [&'static str] {
        match self {
            Theme::None | Theme::Skeleton => &[],
            Theme::Bootstrap => &[BOOTSTRAP_JS, JQUERY_JS],
        }
    }

    /// Concatenate styles, the content block, and scripts.
    pub fn wrap_page(self, content: &str) -> String {
        let mut out = self.styles().join("\n");
        out.push_str(content);
        out.push_str(&self.scripts().join("\n"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_from_name() {
        assert_eq!(Theme::from_name("skeleton").unwrap(), Theme::Skeleton);
        assert_eq!(Theme::from_name("none").unwrap(), Theme::None);
        assert_eq!(Theme::from_name("bootstrap").unwrap(), Theme::Bootstrap);
        let err = Theme::from_name("brutalist").unwrap_err();
        assert!(err.to_string().contains("unknown theme `brutalist`"));
    }

    #[test]
    fn t_wrap_page() {
        let wrapped = Theme::None.wrap_page("<p>hi</p>");
        assert!(wrapped.starts_with("<style>"));
        assert!(wrapped.contains("<p>hi</p>"));
        // The bare theme ships no scripts:
        assert!(!wrapped.contains("<script"));

        let wrapped = Theme::Bootstrap.wrap_page("<p>hi</p>");
        assert!(wrapped.contains("bootstrap.min.css"));
        assert!(wrapped.ends_with("</script>"));
    }
}
