//! Recognised LaTeX commands that pull in other files.

use crate::domain::IncludeKind;
use once_cell::sync::Lazy;
use regex::Regex;

/// A command whose braced argument names one or more files.
pub struct IncludeCommand {
    pub regex: Regex,
    pub kind: IncludeKind,
    /// Whether the argument is a comma-separated list (`\usepackage{a,b}`)
    pub list: bool,
}

/// A command whose braced argument names an image or PDF.
pub struct AssetCommand {
    pub name: &'static str,
    pub regex: Regex,
}

// Optional `[...]` argument; brackets do not nest in practice.
const OPT: &str = r"\s*(?:\[[^\]]*\])?\s*";

fn include(pattern: &str, kind: IncludeKind, list: bool) -> IncludeCommand {
    let regex = Regex::new(&pattern.replace("OPT", OPT)).expect("valid include regex");
    IncludeCommand { regex, kind, list }
}

pub static INCLUDE_COMMANDS: Lazy<Vec<IncludeCommand>> = Lazy::new(|| {
    vec![
        include(r"\\(?:input|include|subfile)\s*\{([^{}]*)\}", IncludeKind::Source, false),
        // plain TeX form: \input file
        include(r"\\input\s+([A-Za-z0-9_./-]+)", IncludeKind::Source, false),
        include(r"\\(?:usepackage|RequirePackage)OPT\{([^{}]*)\}", IncludeKind::Package, true),
        include(r"\\documentclassOPT\{([^{}]*)\}", IncludeKind::DocumentClass, false),
        include(r"\\bibliography\s*\{([^{}]*)\}", IncludeKind::Bibliography, true),
        include(r"\\addbibresourceOPT\{([^{}]*)\}", IncludeKind::Bibliography, false),
        include(r"\\bibliographystyle\s*\{([^{}]*)\}", IncludeKind::BibStyle, false),
    ]
});

pub static ASSET_COMMANDS: Lazy<Vec<AssetCommand>> = Lazy::new(|| {
    let asset = |name: &'static str, pattern: &str| AssetCommand {
        name,
        regex: Regex::new(&pattern.replace("OPT", OPT)).expect("valid asset regex"),
    };
    vec![
        asset("includegraphics", r"\\includegraphics\*?OPT\{([^{}]*)\}"),
        asset("overpic", r"\\begin\s*\{overpic\}OPT\{([^{}]*)\}"),
        asset("includepdf", r"\\includepdfOPT\{([^{}]*)\}"),
    ]
});

static GRAPHICSPATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\graphicspath\s*\{((?:\s*\{[^{}]*\})*)\s*\}").expect("valid regex"));
static BRACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("valid regex"));
static END_DOCUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\end\s*\{document\}").expect("valid regex"));
static PRINT_BIBLIOGRAPHY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\printbibliography\b").expect("valid regex"));
static BIBLATEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(?:addbibresource|printbibliography)\b|\\usepackage\s*(?:\[[^\]]*\])?\s*\{biblatex\}",
    )
    .expect("valid regex")
});

/// Include directives in `line`, in textual order.
pub fn find_includes(line: &str) -> Vec<(IncludeKind, String)> {
    let mut found: Vec<(usize, IncludeKind, String)> = Vec::new();
    for command in INCLUDE_COMMANDS.iter() {
        for caps in command.regex.captures_iter(line) {
            let (Some(whole), Some(arg)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            // `\input{x}` is matched by both forms; keep the braced one.
            if found
                .iter()
                .any(|(start, kind, _)| *start == whole.start() && *kind == command.kind)
            {
                continue;
            }
            if command.list {
                for item in arg.as_str().split(',') {
                    let item = item.trim();
                    if !item.is_empty() {
                        found.push((whole.start(), command.kind, item.to_string()));
                    }
                }
            } else {
                let item = arg.as_str().trim();
                if !item.is_empty() {
                    found.push((whole.start(), command.kind, item.to_string()));
                }
            }
        }
    }
    found.sort_by_key(|(start, _, _)| *start);
    found.into_iter().map(|(_, kind, path)| (kind, path)).collect()
}

/// Asset references in `line` as `(command name, path)`, in textual order.
pub fn find_assets(line: &str) -> Vec<(&'static str, String)> {
    let mut found: Vec<(usize, &'static str, String)> = Vec::new();
    for command in ASSET_COMMANDS.iter() {
        for caps in command.regex.captures_iter(line) {
            let (Some(whole), Some(arg)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let path = arg.as_str().trim();
            if !path.is_empty() {
                found.push((whole.start(), command.name, path.to_string()));
            }
        }
    }
    found.sort_by_key(|(start, _, _)| *start);
    found.into_iter().map(|(_, name, path)| (name, path)).collect()
}

/// Directories listed by `\graphicspath{{a/}{b/}}`.
pub fn find_graphics_paths(line: &str) -> Vec<String> {
    GRAPHICSPATH
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .flat_map(|inner| {
            BRACED
                .captures_iter(inner.as_str())
                .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
                .collect::<Vec<_>>()
        })
        .filter(|dir| !dir.is_empty())
        .collect()
}

pub fn contains_end_document(line: &str) -> bool {
    END_DOCUMENT.is_match(line)
}

/// biblatex documents may print a bibliography without `\bibliography{}`.
pub fn prints_bibliography(line: &str) -> bool {
    PRINT_BIBLIOGRAPHY.is_match(line)
}

/// Whether `line` uses biblatex, whose `.bbl` is written by biber.
pub fn uses_biblatex(line: &str) -> bool {
    BIBLATEX.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_includes() {
        assert_eq!(
            find_includes(r"\input{sections/intro} \include{appendix}"),
            vec![
                (IncludeKind::Source, "sections/intro".to_string()),
                (IncludeKind::Source, "appendix".to_string())
            ]
        );
        assert_eq!(
            find_includes(r"\subfile{part.tex}"),
            vec![(IncludeKind::Source, "part.tex".to_string())]
        );
    }

    #[test]
    fn braced_input_matched_once() {
        assert_eq!(
            find_includes(r"\input {macros}"),
            vec![(IncludeKind::Source, "macros".to_string())]
        );
    }

    #[test]
    fn plain_tex_input() {
        assert_eq!(
            find_includes(r"\input defs.tex"),
            vec![(IncludeKind::Source, "defs.tex".to_string())]
        );
    }

    #[test]
    fn includegraphics_is_not_an_include() {
        assert!(find_includes(r"\includegraphics{fig}").is_empty());
        assert!(find_includes(r"\includepdf{fig}").is_empty());
    }

    #[test]
    fn package_lists_are_split() {
        assert_eq!(
            find_includes(r"\usepackage[utf8]{inputenc, mystyle}"),
            vec![
                (IncludeKind::Package, "inputenc".to_string()),
                (IncludeKind::Package, "mystyle".to_string())
            ]
        );
    }

    #[test]
    fn bibliography_and_style_are_distinct() {
        assert_eq!(
            find_includes(r"\bibliographystyle{abbrv}\bibliography{refs,more}"),
            vec![
                (IncludeKind::BibStyle, "abbrv".to_string()),
                (IncludeKind::Bibliography, "refs".to_string()),
                (IncludeKind::Bibliography, "more".to_string())
            ]
        );
        assert_eq!(
            find_includes(r"\addbibresource[location=local]{refs.bib}"),
            vec![(IncludeKind::Bibliography, "refs.bib".to_string())]
        );
    }

    #[test]
    fn document_class_with_options() {
        assert_eq!(
            find_includes(r"\documentclass[11pt,twocolumn]{article}"),
            vec![(IncludeKind::DocumentClass, "article".to_string())]
        );
    }

    #[test]
    fn assets_with_optional_arguments() {
        assert_eq!(
            find_assets(r"\includegraphics[width=0.5\linewidth, trim=1 2 3 4]{figs/plot}"),
            vec![("includegraphics", "figs/plot".to_string())]
        );
        assert_eq!(
            find_assets(r"\begin{overpic}[scale=.25]{img/a.png}\end{overpic}"),
            vec![("overpic", "img/a.png".to_string())]
        );
        assert_eq!(
            find_assets(r"\includegraphics*{a.pdf} and \includepdf[pages=-]{b.pdf}"),
            vec![("includegraphics", "a.pdf".to_string()), ("includepdf", "b.pdf".to_string())]
        );
    }

    #[test]
    fn graphics_paths() {
        assert_eq!(find_graphics_paths(r"\graphicspath{{figs/}{ img/ }}"), vec!["figs/", "img/"]);
        assert!(find_graphics_paths(r"\graphicspath{}").is_empty());
    }

    #[test]
    fn end_document_detection() {
        assert!(contains_end_document(r"\end{document}"));
        assert!(contains_end_document(r"text \end {document}"));
        assert!(!contains_end_document(r"\end{itemize}"));
        assert!(prints_bibliography(r"\printbibliography[heading=none]"));
    }

    #[test]
    fn biblatex_detection() {
        assert!(uses_biblatex(r"\addbibresource{refs.bib}"));
        assert!(uses_biblatex(r"\usepackage[backend=biber,style=numeric]{biblatex}"));
        assert!(uses_biblatex(r"\printbibliography"));
        assert!(!uses_biblatex(r"\bibliography{refs}"));
        assert!(!uses_biblatex(r"\usepackage{natbib}"));
    }
}
