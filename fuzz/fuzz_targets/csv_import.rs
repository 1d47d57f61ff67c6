#![no_main]

use hunter::csv_import::{CsvImporter, DataSelector};
use hunter::AnalysisOptions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed input must surface as an error, never a panic.
        let mut importer = CsvImporter::new("fuzz");
        importer.attributes = vec!["commit".to_string()];
        if let Ok(series) = importer.parse(input, &DataSelector::default()) {
            let options = AnalysisOptions::default().with_window_len(16);
            let _ = series.analyze(&options);
        }
    }
});
