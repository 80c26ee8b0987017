//! Jobs shared by the integration tests.

#![allow(dead_code)]

pub const JOB_1_NAME: &str = "Oposiciones UCA";
pub const JOB_1_URL: &str = "https://personal.uca.es/oposiciones-turno-libre/";

pub const JOB_2_NAME: &str = "BOE";
pub const JOB_2_URL: &str = "https://www.boe.es/buscar/";

pub const JOB_3_NAME: &str = "Never fetched";
pub const JOB_3_URL: &str = "https://never.example/";

pub const JOBS_YAML: &str = r#"jobs:
  - name: "Oposiciones UCA"
    url: "https://personal.uca.es/oposiciones-turno-libre/"
  - name: "BOE"
    url: "https://www.boe.es/buscar/"
  - name: "Never fetched"
    url: "https://never.example/"
  - name: "Disk usage"
    command: "df -h"
"#;

/// A watcher run where both jobs were processed and the BOE one failed.
pub const LOG_RUN_WITH_ERROR: &str = "\
2024-01-05 10:00:00,001 urlwatch.handler INFO: Processing: <url url='https://personal.uca.es/oposiciones-turno-libre/' max_tries=3 name='Oposiciones UCA'>
2024-01-05 10:00:00,002 urlwatch.handler INFO: Processing: <url url='https://www.boe.es/buscar/' name='BOE'>
2024-01-05 10:00:04,517 urlwatch.worker ERROR: Error while executing job BOE: Read timed out
";

/// A watcher run where both jobs were processed without errors.
pub const LOG_RUN_OK: &str = "\
2024-01-04 10:00:00,001 urlwatch.handler INFO: Processing: <url url='https://personal.uca.es/oposiciones-turno-libre/' max_tries=3 name='Oposiciones UCA'>
2024-01-04 10:00:00,002 urlwatch.handler INFO: Processing: <url url='https://www.boe.es/buscar/' name='BOE'>
";
