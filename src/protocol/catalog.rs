//! Built-in clinical protocol catalogue.
//!
//! Ideal delivery GA per normalized diagnosis or procedure token, grouped
//! by rule family. Every built-in entry uses a 7-day margin.
//!
//! # Reference
//! PT-AON-097 Rev. 4 (2024), "Resolution of pregnancy by clinical indication"

use super::{ProtocolCategory, ProtocolEntry};

const BUILTIN_MARGIN_DAYS: u32 = 7;

const MATERNAL: &[(&str, u32)] = &[
    ("hac", 39),
    ("hac dificil controle", 37),
    ("hipertensao gestacional", 37),
    ("pre-eclampsia", 37),
    ("pre-eclampsia grave", 34),
    ("hellp", 34),
    ("dmg sem insulina", 39),
    ("dmg sem insulina descompensado", 37),
    ("dmg com insulina", 38),
    ("dmg com insulina descompensado", 37),
    ("dm pregestacional", 38),
    ("dm pregestacional descompensado", 36),
    ("placenta previa total", 36),
    ("placenta previa parcial", 37),
    ("placenta baixa", 38),
    ("placenta acreta", 34),
    ("placenta percreta", 34),
    ("rpmo pretermo", 34),
    ("rpmo termo", 37),
    ("tpp atual", 34),
    ("cardiopatia materna", 37),
    ("cardiopatia materna grave", 36),
    ("doenca renal", 37),
    ("lupus", 37),
    ("epilepsia", 38),
    ("trombofilia", 37),
    ("hiv", 38),
    ("herpes ativo", 38),
    ("obesidade morbida", 38),
];

const FETAL: &[(&str, u32)] = &[
    ("macrossomia", 39),
    ("macrossomia severa", 38),
    ("rcf", 37),
    ("rcf grave", 34),
    ("oligodramnia", 37),
    ("oligodramnia severa", 34),
    ("polidramnia", 37),
    ("gemelar bicorionico", 37),
    ("gemelar monocorionico", 34),
    ("gemelar mono mono", 33),
    ("pelvico", 37),
    ("cormica", 37),
    ("malformacao grave", 37),
    ("cardiopatia fetal", 37),
    ("hidrocefalia", 37),
    ("aloimunizacao rh", 37),
    ("obito fetal anterior", 37),
];

const ELECTIVE: &[(&str, u32)] = &[
    ("desejo materno", 39),
    ("idade materna avancada", 39),
    ("iteratividade 1 cesarea", 39),
    ("iteratividade 2 cesareas", 39),
    ("hepatite b", 39),
    ("hepatite c", 39),
    ("gestacao prolongada", 41),
];

const PROCEDURE: &[(&str, u32)] = &[
    ("laqueadura", 39),
    ("cesarea corporal previa", 37),
    ("miomectomia previa", 37),
    ("miomatose", 37),
];

/// Every built-in entry, family by family.
pub(super) fn builtin_entries() -> Vec<ProtocolEntry> {
    [
        (ProtocolCategory::Maternal, MATERNAL),
        (ProtocolCategory::Fetal, FETAL),
        (ProtocolCategory::Elective, ELECTIVE),
        (ProtocolCategory::Procedure, PROCEDURE),
    ]
    .into_iter()
    .flat_map(|(category, rows)| {
        rows.iter().map(move |&(token, weeks)| {
            ProtocolEntry::new(token, weeks, BUILTIN_MARGIN_DAYS)
                .with_category(category)
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tokens_unique_across_families() {
        let entries = builtin_entries();
        let unique: HashSet<_> = entries.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(unique.len(), entries.len());
    }

    #[test]
    fn test_tokens_normalized() {
        for e in builtin_entries() {
            assert_eq!(e.token, e.token.trim().to_lowercase(), "token {:?}", e.token);
            assert!((30..=41).contains(&e.ideal_ga_weeks));
        }
    }
}
