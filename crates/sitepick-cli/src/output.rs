use sitepick_local::DomainReport;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Table,
    Json,
    Txt,
}

/// Stdout rendering of a finished run.
pub fn render(reports: &[DomainReport], format: Format) -> String {
    match format {
        Format::Json => render_json(reports),
        Format::Txt => {
            let mut s = String::new();
            for r in reports {
                let _ = writeln!(s, "\n# {}", r.domain);
                for h in &r.hits {
                    let _ = writeln!(s, "{}", h.url);
                }
            }
            s
        }
        Format::Table => {
            let mut s = String::new();
            for r in reports {
                let _ = writeln!(s, "\n=== {} ({}) ===", r.domain, r.hits.len());
                if let Some(e) = &r.error {
                    let _ = writeln!(s, "  ! {e}");
                }
                for h in &r.hits {
                    let _ = writeln!(s, "  {}", h.url);
                }
            }
            s
        }
    }
}

/// `{domain: [url, ...]}` in input order.
struct ByDomain<'a>(&'a [DomainReport]);

impl serde::Serialize for ByDomain<'_> {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(
            self.0
                .iter()
                .map(|r| (&r.domain, r.hits.iter().map(|h| &h.url).collect::<Vec<_>>())),
        )
    }
}

fn render_json(reports: &[DomainReport]) -> String {
    serde_json::to_string_pretty(&ByDomain(reports)).unwrap_or_else(|_| "{}".to_string())
}

/// Plain file written by `--output`: `# domain` headers followed by URLs.
pub fn render_file(reports: &[DomainReport]) -> String {
    let mut lines = Vec::new();
    for r in reports {
        lines.push(format!("# {}", r.domain));
        lines.extend(r.hits.iter().map(|h| h.url.clone()));
    }
    lines.join("\n")
}
