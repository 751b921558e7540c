//! Diesel row types for runs and canonical records.

use diesel::prelude::*;

use crate::schema;

/// Run row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::scrape_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunRecord {
    pub id: i64,
    pub municipality_code: String,
    pub area: String,
    pub year: i32,
    pub months: String,
    pub kinds: String,
    pub status: String,
    pub engine_used: Option<String>,
    pub records_loaded: i64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// New run for insertion. The id is assigned by SQLite.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::scrape_runs)]
pub struct NewRunRecord<'a> {
    pub municipality_code: &'a str,
    pub area: &'a str,
    pub year: i32,
    pub months: &'a str,
    pub kinds: &'a str,
    pub status: &'a str,
    pub records_loaded: i64,
    pub created_at: &'a str,
}

/// Lifecycle columns written by the orchestrator.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = schema::scrape_runs)]
#[diesel(treat_none_as_null = true)]
pub struct RunLifecycle<'a> {
    pub status: &'a str,
    pub engine_used: Option<&'a str>,
    pub records_loaded: i64,
    pub error_message: Option<&'a str>,
    pub started_at: Option<&'a str>,
    pub completed_at: Option<&'a str>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::honorarium_records)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewHonorariumRow<'a> {
    pub run_id: i64,
    pub month: i32,
    pub name: Option<&'a str>,
    pub identifier: Option<&'a str>,
    pub role: Option<&'a str>,
    pub qualification: Option<&'a str>,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
    pub gross_amount: Option<f64>,
    pub net_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub per_diem: Option<f64>,
    pub currency_unit: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub affiliation: Option<&'a str>,
    pub created_at: &'a str,
}

/// Contract and staff rows share a shape; only the table differs.
macro_rules! staff_row {
    ($name:ident, $table:path) => {
        #[derive(Insertable, Debug)]
        #[diesel(table_name = $table)]
        #[diesel(treat_none_as_default_value = false)]
        pub struct $name<'a> {
            pub run_id: i64,
            pub month: i32,
            pub name: Option<&'a str>,
            pub identifier: Option<&'a str>,
            pub grade: Option<&'a str>,
            pub role: Option<&'a str>,
            pub qualification: Option<&'a str>,
            pub region: Option<&'a str>,
            pub start_date: Option<&'a str>,
            pub end_date: Option<&'a str>,
            pub allowances: Option<f64>,
            pub gross_amount: Option<f64>,
            pub net_amount: Option<f64>,
            pub hours: Option<&'a str>,
            pub notes: Option<&'a str>,
            pub created_at: &'a str,
        }
    };
}

staff_row!(NewContractRow, schema::contract_records);
staff_row!(NewStaffRow, schema::staff_records);
