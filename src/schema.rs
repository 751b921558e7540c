// Diesel table definitions. The SQL that creates them lives in
// `repository::sqlite::SCHEMA_SQL`.

diesel::table! {
    scrape_runs (id) {
        id -> BigInt,
        municipality_code -> Text,
        area -> Text,
        year -> Integer,
        months -> Text,
        kinds -> Text,
        status -> Text,
        engine_used -> Nullable<Text>,
        records_loaded -> BigInt,
        error_message -> Nullable<Text>,
        created_at -> Text,
        started_at -> Nullable<Text>,
        completed_at -> Nullable<Text>,
    }
}

diesel::table! {
    honorarium_records (id) {
        id -> BigInt,
        run_id -> BigInt,
        month -> Integer,
        name -> Nullable<Text>,
        identifier -> Nullable<Text>,
        role -> Nullable<Text>,
        qualification -> Nullable<Text>,
        start_date -> Nullable<Text>,
        end_date -> Nullable<Text>,
        gross_amount -> Nullable<Double>,
        net_amount -> Nullable<Double>,
        total_amount -> Nullable<Double>,
        per_diem -> Nullable<Double>,
        currency_unit -> Nullable<Text>,
        notes -> Nullable<Text>,
        affiliation -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    contract_records (id) {
        id -> BigInt,
        run_id -> BigInt,
        month -> Integer,
        name -> Nullable<Text>,
        identifier -> Nullable<Text>,
        grade -> Nullable<Text>,
        role -> Nullable<Text>,
        qualification -> Nullable<Text>,
        region -> Nullable<Text>,
        start_date -> Nullable<Text>,
        end_date -> Nullable<Text>,
        allowances -> Nullable<Double>,
        gross_amount -> Nullable<Double>,
        net_amount -> Nullable<Double>,
        hours -> Nullable<Text>,
        notes -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    staff_records (id) {
        id -> BigInt,
        run_id -> BigInt,
        month -> Integer,
        name -> Nullable<Text>,
        identifier -> Nullable<Text>,
        grade -> Nullable<Text>,
        role -> Nullable<Text>,
        qualification -> Nullable<Text>,
        region -> Nullable<Text>,
        start_date -> Nullable<Text>,
        end_date -> Nullable<Text>,
        allowances -> Nullable<Double>,
        gross_amount -> Nullable<Double>,
        net_amount -> Nullable<Double>,
        hours -> Nullable<Text>,
        notes -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::joinable!(honorarium_records -> scrape_runs (run_id));
diesel::joinable!(contract_records -> scrape_runs (run_id));
diesel::joinable!(staff_records -> scrape_runs (run_id));

diesel::allow_tables_to_appear_in_same_query!(
    scrape_runs,
    honorarium_records,
    contract_records,
    staff_records,
);
