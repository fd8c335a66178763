//! ArcGIS service path classification
//!
//! Extracts the `(folder, service, service_type)` tuple and map-draw markers
//! from a request path via the fixed REST/WMS URL grammar. Paths that do not
//! match are uncategorized traffic: still counted in summary and burst, never
//! in the service fact table.

use regex::Regex;

use crate::core::config::Project;
use crate::data::types::ServiceKey;
use crate::domain::ingest::RawRecord;

/// A request that classified as service traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHit {
    pub key: ServiceKey,
    /// Export request whose query asked for the rendered image (`f=image`)
    pub export_mapdraw: bool,
    /// WMS request with `request=getmap`
    pub wms_mapdraw: bool,
}

/// One record after classification, ready for aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRecord {
    /// Epoch seconds, uniform zone (the offset was discarded by the parser)
    pub timestamp: i64,
    pub ip_address: String,
    pub is_error: bool,
    pub nbytes: i64,
    /// Referer with any query string stripped
    pub referer: String,
    pub user_agent: String,
    pub service: Option<ServiceHit>,
}

/// Per-project request path classifier
///
/// The project's akadns alias prefix is optional so both proxied and bare
/// `/arcgis/...` paths classify. Matching is case-insensitive throughout;
/// captured values keep their original case.
pub struct PathClassifier {
    regex: Regex,
}

impl PathClassifier {
    pub fn new(project: Project) -> Self {
        let host = regex::escape(&project.akadns_host());
        let pattern = format!(
            r"(?i)(?:/{host})?/arcgis(?:/rest)?/services/(?P<folder>\w+)/(?P<service>\w+)/(?P<service_type>\w+)(?:/(?:export(?:image)?(?P<export_mapdraw>\S*?f=image)?|wmsserver(?P<wms_mapdraw>\S*?request=getmap)?))?"
        );

        Self {
            regex: Regex::new(&pattern).expect("Invalid regex"),
        }
    }

    /// Extract the service tuple and map-draw markers from a request path
    pub fn classify_path(&self, path: &str) -> Option<ServiceHit> {
        let caps = self.regex.captures(path)?;

        Some(ServiceHit {
            key: ServiceKey::new(&caps["folder"], &caps["service"], &caps["service_type"]),
            export_mapdraw: caps.name("export_mapdraw").is_some(),
            wms_mapdraw: caps.name("wms_mapdraw").is_some(),
        })
    }

    /// Classify one parsed record
    pub fn classify(&self, record: RawRecord) -> ClassifiedRecord {
        let service = self.classify_path(&record.path);

        ClassifiedRecord {
            timestamp: record.timestamp.and_utc().timestamp(),
            is_error: record.is_error(),
            ip_address: record.ip_address,
            nbytes: record.byte_count,
            referer: normalize_referer(record.referer),
            user_agent: record.user_agent,
            service,
        }
    }
}

/// Strip the query string before the referer becomes a dimension key
fn normalize_referer(referer: String) -> String {
    match referer.find('?') {
        Some(idx) => referer[..idx].to_string(),
        None => referer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn classifier() -> PathClassifier {
        PathClassifier::new(Project::Idpgis)
    }

    fn raw(path: &str) -> RawRecord {
        RawRecord {
            timestamp: NaiveDate::from_ymd_opt(2019, 7, 17)
                .unwrap()
                .and_hms_opt(23, 40, 31)
                .unwrap(),
            ip_address: "10.0.0.1".to_string(),
            path: path.to_string(),
            status_code: 200,
            byte_count: 1024,
            referer: "-".to_string(),
            user_agent: "test".to_string(),
        }
    }

    #[test]
    fn test_bare_rest_path_classifies() {
        let hit = classifier()
            .classify_path("/arcgis/rest/services/FolderA/ServiceB/MapServer/export?bbox=1&f=image")
            .unwrap();

        assert_eq!(hit.key, ServiceKey::new("FolderA", "ServiceB", "MapServer"));
        assert!(hit.export_mapdraw);
        assert!(!hit.wms_mapdraw);
    }

    #[test]
    fn test_akadns_prefixed_path_classifies() {
        let hit = classifier()
            .classify_path(
                "/idpgis.ncep.noaa.gov.akadns.net/arcgis/rest/services/NWS_Forecasts_Guidance_Warnings/watch_warn_adv/MapServer/export?f=image",
            )
            .unwrap();

        assert_eq!(
            hit.key,
            ServiceKey::new("NWS_Forecasts_Guidance_Warnings", "watch_warn_adv", "MapServer")
        );
        assert!(hit.export_mapdraw);
    }

    #[test]
    fn test_missing_rest_segment_is_tolerated() {
        let hit = classifier()
            .classify_path("/arcgis/services/FolderA/ServiceB/MapServer")
            .unwrap();

        assert_eq!(hit.key, ServiceKey::new("FolderA", "ServiceB", "MapServer"));
        assert!(!hit.export_mapdraw);
        assert!(!hit.wms_mapdraw);
    }

    #[test]
    fn test_export_without_image_format_is_not_a_mapdraw() {
        let hit = classifier()
            .classify_path("/arcgis/rest/services/FolderA/ServiceB/MapServer/export?f=json")
            .unwrap();

        assert!(!hit.export_mapdraw);
    }

    #[test]
    fn test_export_image_variant() {
        let hit = classifier()
            .classify_path("/arcgis/rest/services/radar/radar_base/ImageServer/exportImage?bbox=0&f=image")
            .unwrap();

        assert_eq!(hit.key.service_type, "ImageServer");
        assert!(hit.export_mapdraw);
    }

    #[test]
    fn test_wms_getmap_is_a_mapdraw() {
        let hit = classifier()
            .classify_path(
                "/arcgis/services/nowcoast/analysis_meteohydro/MapServer/WMSServer?SERVICE=WMS&REQUEST=GetMap&BBOX=0,0,1,1",
            )
            .unwrap();

        assert!(hit.wms_mapdraw);
        assert!(!hit.export_mapdraw);
    }

    #[test]
    fn test_wms_getcapabilities_is_not_a_mapdraw() {
        let hit = classifier()
            .classify_path(
                "/arcgis/services/nowcoast/analysis_meteohydro/MapServer/WMSServer?SERVICE=WMS&REQUEST=GetCapabilities",
            )
            .unwrap();

        assert!(!hit.wms_mapdraw);
    }

    #[test]
    fn test_layer_query_still_classifies_without_mapdraw() {
        let hit = classifier()
            .classify_path("/arcgis/rest/services/FolderA/ServiceB/MapServer/0/query?where=1%3D1")
            .unwrap();

        assert_eq!(hit.key, ServiceKey::new("FolderA", "ServiceB", "MapServer"));
        assert!(!hit.export_mapdraw);
    }

    #[test]
    fn test_non_service_paths_miss() {
        let c = classifier();

        assert!(c.classify_path("/robots.txt").is_none());
        assert!(c.classify_path("/arcgis/rest/info?f=json").is_none());
        assert!(c.classify_path("/healthcheck").is_none());
    }

    #[test]
    fn test_case_insensitive_match_preserves_captured_case() {
        let hit = classifier()
            .classify_path("/ArcGIS/REST/services/FolderA/ServiceB/mapserver/EXPORT?F=IMAGE")
            .unwrap();

        assert_eq!(hit.key.service_type, "mapserver");
        assert!(hit.export_mapdraw);
    }

    #[test]
    fn test_classify_strips_referer_query() {
        let c = classifier();
        let mut record = raw("/robots.txt");
        record.referer = "https://coastwatch.noaa.gov/cw/index.html?page=2&size=10".to_string();

        let classified = c.classify(record);
        assert_eq!(classified.referer, "https://coastwatch.noaa.gov/cw/index.html");
        assert!(classified.service.is_none());
    }

    #[test]
    fn test_classify_keeps_plain_referer() {
        let c = classifier();
        let classified = c.classify(raw("/robots.txt"));
        assert_eq!(classified.referer, "-");
    }

    #[test]
    fn test_classify_computes_epoch_and_error() {
        let c = classifier();
        let mut record = raw("/arcgis/rest/services/FolderA/ServiceB/MapServer");
        record.status_code = 502;

        let classified = c.classify(record);
        // 2019-07-17 23:40:31 UTC
        assert_eq!(classified.timestamp, 1_563_406_831);
        assert!(classified.is_error);
        assert!(classified.service.is_some());
    }

    #[test]
    fn test_foreign_host_prefix_still_matches_via_bare_form() {
        // Unanchored search: a foreign host alias is skipped over and the
        // bare /arcgis/... suffix still classifies
        let idpgis = PathClassifier::new(Project::Idpgis);
        let nowcoast = PathClassifier::new(Project::Nowcoast);
        let path = "/nowcoast.ncep.noaa.gov.akadns.net/arcgis/rest/services/nowcoast/radar_meteo_imagery/MapServer/export?f=image";

        assert!(nowcoast.classify_path(path).is_some());
        assert!(idpgis.classify_path(path).is_some());
    }
}
