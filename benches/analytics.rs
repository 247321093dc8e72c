use booking_insights::analytics::{self, ReportType};
use booking_insights::dataset::Dataset;
use criterion::{Criterion, criterion_group, criterion_main};
use std::fmt::Write;
use std::hint::black_box;

const HEADER: &str = "hotel,is_canceled,lead_time,arrival_date_year,arrival_date_month,arrival_date_day_of_month,stays_in_weekend_nights,stays_in_week_nights,adr,country";
const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];
const COUNTRIES: [&str; 13] = [
    "PRT", "GBR", "FRA", "ESP", "DEU", "ITA", "IRL", "BEL", "BRA", "NLD", "USA", "CHE", "NA",
];

fn synthetic_dataset(rows: usize) -> Dataset {
    let mut csv = String::from(HEADER);
    for i in 0..rows {
        write!(
            csv,
            "\n{},{},{},{},{},{},{},{},{},{}",
            if i % 3 == 0 { "Resort Hotel" } else { "City Hotel" },
            u8::from(i % 4 == 0),
            (i * 37) % 700,
            2015 + (i % 3),
            MONTHS[i % 12],
            1 + i % 28,
            i % 3,
            1 + i % 5,
            50.0 + (i % 200) as f64,
            COUNTRIES[i % COUNTRIES.len()],
        )
        .expect("writing to a String cannot fail");
    }
    Dataset::from_reader(csv.as_bytes()).expect("synthetic dataset is valid")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let dataset = synthetic_dataset(20_000);

    for report_type in ReportType::ALL {
        c.bench_function(report_type.as_str(), |b| {
            b.iter(|| analytics::generate_report(black_box(&dataset), report_type))
        });
    }

    c.bench_function("total_revenue", |b| {
        b.iter(|| analytics::total_revenue(black_box(&dataset), "July", 2016))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
