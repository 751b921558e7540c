//! Area, year and month filters on a personnel subsection.
//!
//! The portal renders filters as native selects on some organizations,
//! PrimeFaces select-one menus on others, and plain links or tabs on the
//! rest. Each widget family has a page script; they are tried in
//! [`FilterWidget::ORDER`] and the first that applies the value wins.

use super::locator::DOM_HELPERS;
use crate::scrapers::portal::{month_name, SectionTarget};

const NATIVE_SELECT: &str = r#"(() => {
  __HELPERS__
  const labels = __LABELS__.map(norm);
  const want = norm(__VALUE__);
  const pick = (sel) => {
    const options = Array.from(sel.options);
    return options.find((o) => norm(o.text) === want) || options.find((o) => norm(o.text).includes(want));
  };
  const near = [];
  for (const el of document.querySelectorAll('label, legend, span, td, th, div')) {
    const own = norm(Array.from(el.childNodes).filter((n) => n.nodeType === 3).map((n) => n.textContent).join(' '));
    if (!own || !labels.some((l) => own.includes(l))) continue;
    if (el.htmlFor) {
      const bound = document.getElementById(el.htmlFor);
      if (bound && bound.tagName === 'SELECT') near.push(bound);
    }
    let scope = el;
    for (let i = 0; i < 3 && scope; i += 1, scope = scope.parentElement) {
      const sel = scope.querySelector('select');
      if (sel) { near.push(sel); break; }
    }
  }
  for (const sel of near.concat(Array.from(document.querySelectorAll('select')))) {
    if (sel.disabled || !visible(sel)) continue;
    const option = pick(sel);
    if (!option) continue;
    if (sel.value !== option.value) {
      sel.value = option.value;
      sel.dispatchEvent(new Event('change', { bubbles: true }));
    }
    return true;
  }
  return false;
})()"#;

const CUSTOM_WIDGET: &str = r#"(async () => {
  __HELPERS__
  const labels = __LABELS__.map(norm);
  const want = norm(__VALUE__);
  const labelled = (menu) => {
    let scope = menu.parentElement;
    for (let i = 0; i < 3 && scope; i += 1, scope = scope.parentElement) {
      const text = textOf(scope);
      if (labels.some((l) => text.includes(l))) return true;
    }
    return false;
  };
  const menus = Array.from(document.querySelectorAll("div[class*='selectonemenu']")).filter(visible).filter(labelled);
  for (const menu of menus) {
    const trigger = menu.querySelector('.ui-selectonemenu-trigger') || menu;
    trigger.click();
    for (let i = 0; i < 20; i += 1) {
      await new Promise((r) => setTimeout(r, 100));
      const items = Array.from(document.querySelectorAll('li[data-label], .ui-selectonemenu-items li')).filter(visible);
      const hit = items.find((li) => norm(li.getAttribute('data-label')) === want)
        || items.find((li) => textOf(li).includes(want));
      if (hit) { hit.click(); return true; }
    }
    trigger.click();
  }
  return false;
})()"#;

const LINK_OR_TAB: &str = r#"(() => {
  __HELPERS__
  const want = norm(__VALUE__);
  for (const css of ['a', 'li a', 'span']) {
    const candidates = Array.from(document.querySelectorAll(css)).filter((el) => textOf(el).includes(want)).slice(0, 5);
    const el = candidates.find(visible);
    if (el) {
      el.scrollIntoView({ block: 'center' });
      el.click();
      return true;
    }
  }
  return false;
})()"#;

/// Widget families a filter can be rendered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterWidget {
    NativeSelect,
    CustomWidget,
    LinkOrTab,
}

impl FilterWidget {
    pub const ORDER: [FilterWidget; 3] = [Self::NativeSelect, Self::CustomWidget, Self::LinkOrTab];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativeSelect => "native select",
            Self::CustomWidget => "custom widget",
            Self::LinkOrTab => "link or tab",
        }
    }

    /// Script resolving to `true` when the value was applied.
    pub fn script(&self, labels: &[&str], value: &str) -> String {
        let template = match self {
            Self::NativeSelect => NATIVE_SELECT,
            Self::CustomWidget => CUSTOM_WIDGET,
            Self::LinkOrTab => LINK_OR_TAB,
        };
        let labels = serde_json::to_string(labels).unwrap_or_else(|_| "[]".to_string());
        let value = serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string());
        template
            .replace("__HELPERS__", DOM_HELPERS)
            .replace("__LABELS__", &labels)
            .replace("__VALUE__", &value)
    }
}

/// One filter to apply, with the checkpoint name taken after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStep {
    pub labels: &'static [&'static str],
    pub value: String,
    pub stage: String,
}

/// Filters for a section in application order: area (when given), year, month.
pub fn section_filters(target: &SectionTarget) -> Vec<FilterStep> {
    let mut steps = Vec::with_capacity(3);
    if !target.area.trim().is_empty() {
        steps.push(FilterStep {
            labels: &["Área", "Area"],
            value: target.area.clone(),
            stage: "04_area_selected".to_string(),
        });
    }
    steps.push(FilterStep {
        labels: &["Año", "Periodo"],
        value: target.year.to_string(),
        stage: "05_year_selected".to_string(),
    });
    steps.push(FilterStep {
        labels: &["Mes", "Periodo"],
        value: month_name(target.month)
            .map(str::to_string)
            .unwrap_or_else(|| target.month.to_string()),
        stage: format!("06_month_{:02}", target.month),
    });
    steps
}
