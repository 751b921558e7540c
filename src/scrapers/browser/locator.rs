//! Selector syntax of the UI selector banks.
//!
//! Bank entries are plain CSS plus three extensions:
//! `text=Foo` (innermost element containing "Foo"),
//! `tag:has-text('Foo')` (a `tag` containing "Foo") and
//! `A >> B` (B scoped inside matches of A).
//! Text matching is case-insensitive over collapsed whitespace.
//!
//! A [`Locator`] compiles to a self-contained script that is evaluated in the
//! page and reports an [`Outcome`].

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static HAS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<before>.*?):has-text\(\s*['"](?P<text>.*?)['"]\s*\)(?P<after>.*)$"#)
        .expect("valid has-text regex")
});

/// Helpers shared by every page script.
pub(crate) const DOM_HELPERS: &str = r#"
  const norm = (s) => String(s || '').replace(/\s+/g, ' ').trim().toLowerCase();
  const textOf = (el) => norm(el.innerText !== undefined ? el.innerText : el.textContent);
  const visible = (el) => {
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    return el.getClientRects().length > 0;
  };
"#;

const LOCATE_TEMPLATE: &str = r#"(() => {
  __HELPERS__
  const steps = __STEPS__;
  const action = __ACTION__;
  let roots = [document];
  for (const step of steps) {
    const found = [];
    for (const root of roots) {
      let els;
      try { els = Array.from(root.querySelectorAll(step.css)); } catch (e) { return 'invalid'; }
      if (step.text) {
        const want = norm(step.text);
        els = els.filter((el) => textOf(el).includes(want));
        if (step.innermost) {
          els = els.filter((el) => !Array.from(el.children).some((c) => textOf(c).includes(want)));
        }
      }
      for (const el of els) { if (!found.includes(el)) found.push(el); }
    }
    roots = found;
    if (roots.length === 0) return 'missing';
  }
  const target = roots.find(visible);
  if (!target) return 'hidden';
  if (action === 'click_enabled') {
    const cls = String(target.getAttribute('class') || '');
    if (target.disabled || target.getAttribute('aria-disabled') === 'true'
        || /(^|\s)(disabled|ui-state-disabled)(\s|$)/.test(cls)) return 'disabled';
  }
  target.scrollIntoView({ block: 'center' });
  target.click();
  return 'clicked';
})()"#;

/// One `>>`-separated part of a locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub css: String,
    pub text: Option<String>,
    pub innermost: bool,
}

impl Step {
    fn parse(part: &str) -> Option<Self> {
        let part = part.trim();
        if part.is_empty() {
            return None;
        }

        if let Some(text) = part.strip_prefix("text=") {
            let text = unquote(text);
            return (!text.is_empty()).then(|| Self {
                css: "*".to_string(),
                text: Some(text.to_string()),
                innermost: true,
            });
        }

        if let Some(caps) = HAS_TEXT.captures(part) {
            let css = format!("{}{}", &caps["before"], &caps["after"]);
            let css = css.trim();
            return Some(Self {
                css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                text: Some(caps["text"].to_string()),
                innermost: false,
            });
        }

        Some(Self {
            css: part.to_string(),
            text: None,
            innermost: false,
        })
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// What to do with the first visible match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Click,
    /// Click only if the element is not disabled (pagination controls).
    ClickEnabled,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::ClickEnabled => "click_enabled",
        }
    }
}

/// Result reported by a locator script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clicked,
    Missing,
    Hidden,
    Disabled,
    Invalid,
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clicked" => Ok(Self::Clicked),
            "missing" => Ok(Self::Missing),
            "hidden" => Ok(Self::Hidden),
            "disabled" => Ok(Self::Disabled),
            "invalid" => Ok(Self::Invalid),
            other => Err(format!("unknown locator outcome: {}", other)),
        }
    }
}

/// A parsed bank entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    source: String,
    steps: Vec<Step>,
}

impl Locator {
    pub fn parse(source: &str) -> Option<Self> {
        let steps = source
            .split(">>")
            .map(Step::parse)
            .collect::<Option<Vec<_>>>()?;
        if steps.is_empty() {
            return None;
        }
        Some(Self {
            source: source.to_string(),
            steps,
        })
    }

    /// Parse a whole bank, skipping malformed entries.
    pub fn parse_bank(bank: &[String]) -> Vec<Self> {
        bank.iter().filter_map(|s| Self::parse(s)).collect()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Script that performs `action` on the first visible match.
    pub fn script(&self, action: Action) -> String {
        let steps = serde_json::to_string(&self.steps).unwrap_or_else(|_| "[]".to_string());
        LOCATE_TEMPLATE
            .replace("__HELPERS__", DOM_HELPERS)
            .replace("__STEPS__", &steps)
            .replace("__ACTION__", &format!("'{}'", action.as_str()))
    }
}
