use std::time::Instant;

use crate::core::summary::ExportSummary;
use crate::domain::expression::ImageRecipe;
use crate::domain::geometry::Geometry;
use crate::domain::job::{ExportRequest, JobHandle};
use crate::domain::model::{DateRange, FileFormat, ProductConfig, YearRange};
use crate::domain::ports::ExportSink;
use crate::utils::error::{GeoExportError, Result};

/// 每個（產品, 年份）排入一個匯出工作；依產品順序、年份遞增逐一提交
pub struct YearlyExporter<S: ExportSink> {
    sink: S,
    drive_folder: Option<String>,
}

impl<S: ExportSink> YearlyExporter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            drive_folder: None,
        }
    }

    pub fn with_drive_folder(mut self, folder: Option<String>) -> Self {
        self.drive_folder = folder;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn build_request(
        &self,
        product: &ProductConfig,
        year: i32,
        roi: &Geometry,
    ) -> Result<ExportRequest> {
        let recipe = ImageRecipe {
            dataset: product.dataset.clone(),
            range: DateRange::for_year(year)?,
            reducer: product.reducer,
            transform: product.transform,
            clip_to: roi.clone(),
        };

        Ok(ExportRequest {
            product: product.name.clone(),
            year,
            recipe,
            description: product.description_for(year),
            scale: product.scale,
            region: roi.clone(),
            file_format: FileFormat::GeoTiff,
            drive_folder: self.drive_folder.clone(),
        })
    }

    /// 本次執行的所有請求（依提交順序）；描述重複會在目的地互相覆蓋，直接拒絕
    pub fn plan(
        &self,
        products: &[ProductConfig],
        years: YearRange,
        roi: &Geometry,
    ) -> Result<Vec<ExportRequest>> {
        roi.validate()?;

        let mut requests = Vec::with_capacity(products.len() * years.len());
        for product in products {
            for year in years.iter() {
                requests.push(self.build_request(product, year, roi)?);
            }
        }

        let mut seen = std::collections::HashSet::new();
        for request in &requests {
            if !seen.insert(request.description.as_str()) {
                return Err(GeoExportError::DuplicateDescriptionError {
                    description: request.description.clone(),
                });
            }
        }

        Ok(requests)
    }

    pub async fn export_year(
        &self,
        product: &ProductConfig,
        year: i32,
        roi: &Geometry,
    ) -> Result<JobHandle> {
        let request = self.build_request(product, year, roi)?;
        self.sink.submit(&request).await
    }

    /// 提交整份計畫；被拒絕的提交會記錄下來並繼續，不重試
    pub async fn run(
        &self,
        products: &[ProductConfig],
        years: YearRange,
        roi: &Geometry,
    ) -> Result<ExportSummary> {
        let start = Instant::now();
        let requests = self.plan(products, years, roi)?;
        let mut summary = ExportSummary::new(requests.len());

        tracing::info!(
            "🚀 Submitting {} exports for {} products, years {}-{}",
            requests.len(),
            products.len(),
            years.start,
            years.end
        );

        for request in &requests {
            match self.sink.submit(request).await {
                Ok(handle) => {
                    tracing::info!("✅ Queued {} ({})", request.description, handle.operation);
                    summary.record_submitted(&request.product, request.year, handle);
                }
                Err(e) => {
                    tracing::error!("❌ Failed to queue {}: {}", request.description, e);
                    summary.record_failure(
                        &request.product,
                        request.year,
                        &request.description,
                        e.to_string(),
                    );
                }
            }
        }

        Ok(summary.with_duration(start.elapsed()))
    }
}
