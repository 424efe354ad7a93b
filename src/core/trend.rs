//! 每個網格的逐年線性趨勢
//!
//! 輸入表格每列一個網格、每年一欄（例如 `BA_2000 … BA_2024`），
//! 以最小平方法求數值對年份的斜率，附加為 `BA_slope` 欄。

use std::io::{Read, Write};

use crate::domain::model::YearRange;
use crate::utils::error::{GeoExportError, Result};

#[derive(Debug, Clone)]
pub struct TrendOptions {
    pub prefix: String,
    pub years: YearRange,
}

impl Default for TrendOptions {
    fn default() -> Self {
        Self {
            prefix: "BA_".to_string(),
            years: YearRange::default(),
        }
    }
}

impl TrendOptions {
    pub fn slope_column(&self) -> String {
        format!("{}slope", self.prefix)
    }
}

/// `ys` 對 `xs` 的最小平方法斜率
///
/// 任一值為 NaN 或少於兩點時回傳 NaN
pub fn ols_slope(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return f64::NAN;
    }
    if ys.iter().any(|y| y.is_nan()) {
        return f64::NAN;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }

    if sxx == 0.0 {
        return f64::NAN;
    }
    sxy / sxx
}

fn parse_value(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// 從 `reader` 讀表，加上斜率欄後寫到 `writer`，回傳寫出的列數
pub fn append_slope_column<R: Read, W: Write>(
    reader: R,
    writer: W,
    options: &TrendOptions,
) -> Result<usize> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    // 只用檔案裡實際存在的年份欄位
    let mut columns = Vec::new();
    for year in options.years.iter() {
        let name = format!("{}{}", options.prefix, year);
        if let Some(index) = headers.iter().position(|h| h == name) {
            columns.push((index, year as f64));
        }
    }

    if columns.is_empty() {
        return Err(GeoExportError::ProcessingError {
            message: format!(
                "no '{}<year>' columns for years {}-{}",
                options.prefix, options.years.start, options.years.end
            ),
        });
    }
    tracing::info!("Using {} yearly columns", columns.len());

    let slope_column = options.slope_column();
    let slope_index = headers.iter().position(|h| h == slope_column);

    let mut out_headers = headers.clone();
    if slope_index.is_none() {
        out_headers.push_field(&slope_column);
    }

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&out_headers)?;

    let xs: Vec<f64> = columns.iter().map(|(_, year)| *year).collect();
    let mut rows = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        let ys: Vec<f64> = columns
            .iter()
            .map(|(index, _)| record.get(*index).map(parse_value).unwrap_or(f64::NAN))
            .collect();

        let slope = ols_slope(&xs, &ys);
        let formatted = if slope.is_nan() {
            "NaN".to_string()
        } else {
            slope.to_string()
        };

        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        match slope_index {
            // 已有 slope 欄位就覆寫
            Some(index) if index < fields.len() => fields[index] = formatted,
            _ => fields.push(formatted),
        }
        csv_writer.write_record(&fields)?;
        rows += 1;
    }

    csv_writer.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ols_slope_exact_line() {
        let xs = [2000.0, 2001.0, 2002.0, 2003.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        assert!((ols_slope(&xs, &ys) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ols_slope_nan_cases() {
        let xs = [2000.0, 2001.0, 2002.0];
        assert!(ols_slope(&xs, &[f64::NAN, f64::NAN, f64::NAN]).is_nan());
        assert!(ols_slope(&xs, &[1.0, f64::NAN, 2.0]).is_nan());
        assert!(ols_slope(&[2000.0], &[1.0]).is_nan());
    }

    #[test]
    fn test_append_slope_column() {
        let input = "id,BA_2000,BA_2001,BA_2002,name\n\
                     1,0,1,2,a\n\
                     2,,,,b\n\
                     3,4,4,4,c\n";
        let options = TrendOptions {
            prefix: "BA_".to_string(),
            years: YearRange::new(2000, 2002).unwrap(),
        };

        let mut output = Vec::new();
        let rows = append_slope_column(input.as_bytes(), &mut output, &options).unwrap();
        assert_eq!(rows, 3);

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,BA_2000,BA_2001,BA_2002,name,BA_slope");
        assert_eq!(lines[1], "1,0,1,2,a,1");
        assert_eq!(lines[2], "2,,,,b,NaN");
        assert_eq!(lines[3], "3,4,4,4,c,0");
    }

    #[test]
    fn test_missing_year_columns_use_present_years() {
        // 2001 欄位缺漏時，x 軸仍用實際年份
        let input = "BA_2000,BA_2002\n0,4\n";
        let options = TrendOptions {
            prefix: "BA_".to_string(),
            years: YearRange::new(2000, 2002).unwrap(),
        };
        let mut output = Vec::new();
        append_slope_column(input.as_bytes(), &mut output, &options).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().nth(1), Some("0,4,2"));
    }

    #[test]
    fn test_no_matching_columns() {
        let input = "id,value\n1,2\n";
        let mut output = Vec::new();
        assert!(append_slope_column(input.as_bytes(), &mut output, &TrendOptions::default()).is_err());
    }
}
