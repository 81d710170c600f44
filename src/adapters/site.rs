//! Portal generations.
//!
//! The transparency portal has changed layout several times. Each generation
//! is described by an immutable [`SiteAdapter`]; the one serving a period is
//! picked by [`SiteAdapter::for_period`].

use crate::domain::model::{DocumentKind, Period, PeriodSelector};
use std::borrow::Cow;

pub const DEFAULT_BASE_URL: &str = "https://transparenciaweb.mpms.mp.br/contracheque";

/// Month abbreviations as the portal displays them (pt-BR).
pub const PT_BR_MONTHS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    StaticTable,
    RowIndexed,
    Dashboard,
}

/// Menu entries that open each document's section.
#[derive(Debug, Clone, Copy)]
pub struct Sections {
    pub payroll: &'static str,
    pub indemnities: &'static str,
}

/// A point-and-click dropdown addressed by display text.
#[derive(Debug, Clone, Copy)]
pub struct DropdownWidget {
    /// Node showing the currently selected value.
    pub current: &'static str,
    /// Node that opens the option list.
    pub opener: &'static str,
    /// Option node; `{label}` is replaced by the display text.
    pub option: &'static str,
    /// Some widget instances only register the open action on the second try.
    pub open_twice: bool,
}

impl DropdownWidget {
    pub fn option_for(&self, label: &str) -> String {
        self.option.replace("{label}", label)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SelectionStrategy {
    /// Values written straight into `<select>` controls, then the form submitted.
    ValueAssign {
        year: &'static str,
        month: Option<&'static str>,
        submit: &'static str,
    },
    /// Separate year and month dropdown widgets.
    Dropdown {
        year: DropdownWidget,
        month: DropdownWidget,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ExportStrategy {
    /// A single export link.
    Fixed { target: &'static str },
    /// One export link per table row, newest month first. `{row}` in
    /// `target` is replaced by the computed row.
    RowIndexed {
        rows: &'static str,
        target: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct SiteAdapter {
    pub generation: Generation,
    pub base_url: Cow<'static, str>,
    pub sections: Sections,
    pub selection: SelectionStrategy,
    pub export: ExportStrategy,
    /// Extra action needed after the export trigger before the download starts.
    pub confirm_export: Option<&'static str>,
    pub month_names: [&'static str; 12],
    /// Last period this generation serves; `None` for the current one.
    pub serves_until: Option<Period>,
    /// First period for which the indemnities spreadsheet exists.
    pub indemnities_from: Period,
}

static STATIC_TABLE: SiteAdapter = SiteAdapter {
    generation: Generation::StaticTable,
    base_url: Cow::Borrowed(DEFAULT_BASE_URL),
    sections: Sections {
        payroll: r#"//*[@id="menu-contracheque"]/li[1]/a"#,
        indemnities: r#"//*[@id="menu-contracheque"]/li[2]/a"#,
    },
    selection: SelectionStrategy::ValueAssign {
        year: r#"//*[@id="filtro"]/form/select[@name="ano"]"#,
        month: Some(r#"//*[@id="filtro"]/form/select[@name="mes"]"#),
        submit: r#"//*[@id="filtro"]/form/button"#,
    },
    export: ExportStrategy::Fixed {
        target: r#"//*[@id="planilha"]/a[contains(@href, ".xls")]"#,
    },
    confirm_export: None,
    month_names: PT_BR_MONTHS,
    serves_until: Some(Period::new(2017, 12)),
    // Published alongside payroll for every period this layout serves.
    indemnities_from: Period::new(i32::MIN, 1),
};

static ROW_INDEXED: SiteAdapter = SiteAdapter {
    generation: Generation::RowIndexed,
    base_url: Cow::Borrowed(DEFAULT_BASE_URL),
    sections: Sections {
        payroll: r#"//*[@id="menu-interno-estatico"]/li[1]/a"#,
        indemnities: r#"//*[@id="menu-interno-estatico"]/li[8]/a"#,
    },
    selection: SelectionStrategy::ValueAssign {
        year: r#"//*[@id="box-seach"]/form/select"#,
        month: None,
        submit: r#"//*[@id="box-seach"]/form/button"#,
    },
    export: ExportStrategy::RowIndexed {
        rows: "//tr",
        target: "/html/body/div[3]/div[2]/div[3]/div/table/tbody/tr[{row}]/td[3]/a",
    },
    confirm_export: None,
    month_names: PT_BR_MONTHS,
    serves_until: Some(Period::new(2019, 12)),
    indemnities_from: Period::new(2019, 6),
};

static DASHBOARD: SiteAdapter = SiteAdapter {
    generation: Generation::Dashboard,
    base_url: Cow::Borrowed(DEFAULT_BASE_URL),
    sections: Sections {
        payroll: r#"//*[@id="menu-painel"]//a[normalize-space()="Contracheque"]"#,
        indemnities: r#"//*[@id="menu-painel"]//a[normalize-space()="Verbas Indenizatórias"]"#,
    },
    selection: SelectionStrategy::Dropdown {
        year: DropdownWidget {
            current: r#"//div[@aria-label="Ano"]//div[@class="slicer-restatement"]"#,
            opener: r#"//div[@aria-label="Ano"]//div[contains(@class, "slicer-dropdown-menu")]"#,
            option: r#"//div[contains(@class, "slicer-dropdown-popup")]//span[@title="{label}"]"#,
            open_twice: false,
        },
        month: DropdownWidget {
            current: r#"//div[@aria-label="Mês"]//div[@class="slicer-restatement"]"#,
            opener: r#"//div[@aria-label="Mês"]//div[contains(@class, "slicer-dropdown-menu")]"#,
            option: r#"//div[contains(@class, "slicer-dropdown-popup")]//span[@title="{label}"]"#,
            open_twice: true,
        },
    },
    export: ExportStrategy::Fixed {
        target: r#"//button[@title="Exportar dados"]"#,
    },
    confirm_export: Some(r#"//div[@role="dialog"]//button[normalize-space()="Exportar"]"#),
    month_names: PT_BR_MONTHS,
    serves_until: None,
    indemnities_from: Period::new(2020, 1),
};

static GENERATIONS: [&SiteAdapter; 3] = [&STATIC_TABLE, &ROW_INDEXED, &DASHBOARD];

impl SiteAdapter {
    /// The generation that published `period`.
    pub fn for_period(period: Period) -> SiteAdapter {
        Self::all()
            .find(|adapter| adapter.serves_until.map_or(true, |last| period <= last))
            .cloned()
            .unwrap_or_else(|| DASHBOARD.clone())
    }

    pub fn all() -> impl Iterator<Item = &'static SiteAdapter> {
        GENERATIONS.iter().copied()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Cow::Owned(base_url.into());
        self
    }

    /// Localized abbreviation for `month` (1-12).
    pub fn month_name(&self, month: u32) -> Option<&'static str> {
        let index = usize::try_from(month).ok()?.checked_sub(1)?;
        self.month_names.get(index).copied()
    }

    pub fn indemnities_eligible(&self, period: Period) -> bool {
        period >= self.indemnities_from
    }

    /// Documents to collect for `period`, payroll first.
    pub fn documents(&self, period: Period) -> Vec<DocumentKind> {
        let mut documents = vec![DocumentKind::Payroll];
        if self.indemnities_eligible(period) {
            documents.push(DocumentKind::Indemnities);
        }
        documents
    }

    pub fn section(&self, kind: DocumentKind) -> &'static str {
        match kind {
            DocumentKind::Payroll => self.sections.payroll,
            DocumentKind::Indemnities => self.sections.indemnities,
        }
    }

    pub fn selector(&self, period: Period) -> Option<PeriodSelector> {
        Some(PeriodSelector {
            period,
            year_label: period.year.to_string(),
            month_value: format!("{:02}", period.month),
            month_label: self.month_name(period.month)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn month_names_are_total_and_distinct() {
        for adapter in SiteAdapter::all() {
            let names: Vec<_> = (1..=12).map(|m| adapter.month_name(m).unwrap()).collect();
            let unique: HashSet<_> = names.iter().collect();
            assert_eq!(unique.len(), 12);
            assert!(names.iter().all(|n| n.len() == 3));
            assert_eq!(adapter.month_name(0), None);
            assert_eq!(adapter.month_name(13), None);
        }
        assert_eq!(DASHBOARD.month_name(2), Some("Fev"));
        assert_eq!(DASHBOARD.month_name(9), Some("Set"));
    }

    #[test]
    fn generations_are_picked_by_period() {
        let cases = [
            (Period::new(2015, 4), Generation::StaticTable),
            (Period::new(2017, 12), Generation::StaticTable),
            (Period::new(2018, 1), Generation::RowIndexed),
            (Period::new(2019, 12), Generation::RowIndexed),
            (Period::new(2020, 1), Generation::Dashboard),
            (Period::new(2031, 7), Generation::Dashboard),
        ];
        for (period, generation) in cases {
            assert_eq!(SiteAdapter::for_period(period).generation, generation, "{}", period);
        }
    }

    #[test]
    fn indemnities_cutoffs() {
        let row = SiteAdapter::for_period(Period::new(2018, 1));
        assert!(!row.indemnities_eligible(Period::new(2018, 1)));
        assert!(!row.indemnities_eligible(Period::new(2019, 5)));
        assert!(row.indemnities_eligible(Period::new(2019, 6)));

        let legacy = SiteAdapter::for_period(Period::new(2016, 1));
        for period in [Period::new(2010, 1), Period::new(2016, 1), Period::new(2017, 12)] {
            assert_eq!(
                legacy.documents(period),
                vec![DocumentKind::Payroll, DocumentKind::Indemnities],
                "{}",
                period
            );
        }

        let dashboard = SiteAdapter::for_period(Period::new(2021, 3));
        assert_eq!(
            dashboard.documents(Period::new(2021, 3)),
            vec![DocumentKind::Payroll, DocumentKind::Indemnities]
        );
    }

    #[test]
    fn eligibility_is_monotonic() {
        for adapter in SiteAdapter::all() {
            let mut seen_eligible = false;
            for year in 2010..=2030 {
                for month in 1..=12 {
                    let eligible = adapter.indemnities_eligible(Period::new(year, month));
                    assert!(!seen_eligible || eligible, "{:?} {}/{}", adapter.generation, month, year);
                    seen_eligible |= eligible;
                }
            }
        }
    }

    #[test]
    fn selector_derives_labels_once() {
        let adapter = SiteAdapter::for_period(Period::new(2021, 3));
        let selector = adapter.selector(Period::new(2021, 3)).unwrap();
        assert_eq!(selector.year_label, "2021");
        assert_eq!(selector.month_value, "03");
        assert_eq!(selector.month_label, "Mar");
    }

    #[test]
    fn base_url_can_be_overridden() {
        let adapter = SiteAdapter::for_period(Period::new(2019, 1)).with_base_url("http://localhost:8080");
        assert_eq!(adapter.base_url, "http://localhost:8080");
        assert_eq!(ROW_INDEXED.base_url, DEFAULT_BASE_URL);
    }
}
