use std::{fs, path::Path, sync::Arc};

use tempfile::tempdir;

use csv_inquire::{
    dataset::Dataset,
    narrative::DisabledNarrator,
    service::QueryService,
    snapshot::{FsStorage, Store},
};

const ROSTER: &str = "NOMBRE,PARALELO,AUTOESTIMA\nAna Ruiz,A,80\nBeto Paz,B,30\n";

fn service_for(dir: &Path, table: &str, docs: Option<&[(&str, &str)]>) -> QueryService {
    let table_path = dir.join("students.csv");
    fs::write(&table_path, table).expect("write table fixture");

    let docs_dir = docs.map(|entries| {
        let docs_path = dir.join("docs");
        fs::create_dir_all(&docs_path).expect("create docs dir");
        for (name, body) in entries {
            fs::write(docs_path.join(format!("{name}.txt")), body).expect("write doc");
        }
        docs_path
    });

    let storage = FsStorage::new(table_path, docs_dir, encoding_rs::UTF_8);
    let store = Store::open(Box::new(storage), None).expect("open store");
    QueryService::new(Arc::new(store), Box::new(DisabledNarrator))
}

#[test]
fn grouped_average_matches_expected_table() {
    let dir = tempdir().unwrap();
    let service = service_for(dir.path(), ROSTER, None);
    let envelope = service.answer("average of AUTOESTIMA by PARALELO");
    assert!(envelope.ok);
    assert_eq!(
        envelope.tables[0].rows,
        vec![
            vec!["A".to_string(), "80".to_string()],
            vec!["B".to_string(), "30".to_string()],
        ]
    );
}

#[test]
fn top_one_highest_returns_full_row() {
    let dir = tempdir().unwrap();
    let service = service_for(dir.path(), ROSTER, None);
    let envelope = service.answer("top 1 highest AUTOESTIMA");
    assert_eq!(
        envelope.tables[0].rows,
        vec![vec![
            "Ana Ruiz".to_string(),
            "A".to_string(),
            "80".to_string()
        ]]
    );
}

#[test]
fn percentile_of_beto_uses_mid_rank_formula() {
    let dir = tempdir().unwrap();
    let service = service_for(dir.path(), ROSTER, None);
    let envelope = service.answer("percentile of Beto in AUTOESTIMA");
    // Mid-rank over [80, 30]: 100 * (0 + 0.5 * 1) / 2 = 25.
    assert!(envelope.general.contains("percentile 25"));
}

#[test]
fn report_of_missing_student_suggests_close_names() {
    let dir = tempdir().unwrap();
    let service = service_for(dir.path(), "NOMBRE,AUTOESTIMA\nCarla Nuñez,70\n", None);
    let envelope = service.answer("full report of Carla Fernandez");
    assert!(envelope.ok);
    assert!(envelope.general.contains("not found"));
    let suggestions: Vec<&String> = envelope.lists.iter().flat_map(|l| &l.items).collect();
    assert!(suggestions.contains(&&"Carla Nuñez".to_string()));
}

#[test]
fn empty_csv_yields_no_data_envelope() {
    let dir = tempdir().unwrap();
    let service = service_for(dir.path(), "", None);
    let envelope = service.answer("average of AUTOESTIMA");
    assert!(envelope.ok);
    assert!(envelope.general.contains("No data"));
    assert!(envelope.tables.is_empty());
}

#[test]
fn semicolon_file_with_decimal_commas_loads() {
    let dir = tempdir().unwrap();
    let table = "NOMBRE;PARALELO;NOTA\nAna Ruiz;A;7,5\nBeto Paz;B;6,0\n";
    let service = service_for(dir.path(), table, None);
    let envelope = service.answer("average of NOTA");
    assert!(envelope.general.contains("6.8"));
}

#[test]
fn filtered_average_restricts_the_cohort() {
    let dir = tempdir().unwrap();
    let table = "NOMBRE,PARALELO,NOTA\nAna,A,80\nBeto,B,30\nCarla,A,60\n";
    let service = service_for(dir.path(), table, None);
    let envelope = service.answer("average of NOTA paralelo A");
    assert!(envelope.general.contains("70"));
    assert!(envelope.general.contains("2 value(s)"));
}

#[test]
fn threshold_question_lists_matching_rows() {
    let dir = tempdir().unwrap();
    let service = service_for(dir.path(), ROSTER, None);
    let envelope = service.answer("students with AUTOESTIMA >= 50");
    assert_eq!(envelope.tables[0].rows.len(), 1);
    assert_eq!(envelope.tables[0].rows[0][0], "Ana Ruiz");
}

#[test]
fn top_k_desc_and_asc_cover_both_tails() {
    let dir = tempdir().unwrap();
    let table = "NOMBRE,NOTA\nAna,10\nBeto,20\nCarla,30\nDora,40\n";
    let service = service_for(dir.path(), table, None);

    let highest = service.answer("top 2 highest NOTA");
    let lowest = service.answer("top 2 lowest NOTA");
    let names = |envelope: &csv_inquire::envelope::ResponseEnvelope| {
        envelope.tables[0]
            .rows
            .iter()
            .map(|r| r[0].clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&highest), vec!["Dora", "Carla"]);
    assert_eq!(names(&lowest), vec!["Ana", "Beto"]);
}

#[test]
fn document_question_quotes_the_document() {
    let dir = tempdir().unwrap();
    let service = service_for(
        dir.path(),
        ROSTER,
        Some(&[("mision", "Formar estudiantes íntegros.")]),
    );
    let envelope = service.answer("cual es la mision del colegio");
    assert!(envelope.general.contains("Formar estudiantes íntegros."));
}

#[test]
fn loader_round_trips_first_row_values() {
    let data = Dataset::parse(ROSTER, None);
    let first: Vec<String> = (0..data.columns.len())
        .map(|col| data.display_value(&data.rows[0], col))
        .collect();
    assert_eq!(first, vec!["Ana Ruiz", "A", "80"]);
    assert_eq!(
        data.columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>(),
        vec!["NOMBRE", "PARALELO", "AUTOESTIMA"]
    );
}
