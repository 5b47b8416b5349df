use crate::infra::InMemoryMatterRepository;
use chrono::NaiveDate;
use clap::Args;
use filing_binder::config::{AppConfig, CompilationSettings};
use filing_binder::error::AppError;
use filing_binder::workflows::compilation::{
    CompilationOutputMode, CompilationService, EvaluationConfig, Forum, MatterRecord,
    PackageRequest, PackageResponse, ReadinessRequest, RuleCatalogStore, StaticCatalogStore,
    TocEntry,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CompileArgs {
    /// Matter record JSON (forum, documents, optional facts and pins)
    #[arg(long)]
    pub(crate) matter: PathBuf,
    /// Output mode; compiled PDFs need the server with a binder
    #[arg(long, default_value = "metadata_plan_only", value_parser = parse_mode)]
    pub(crate) mode: CompilationOutputMode,
    /// Date used for disclosure deadlines (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) as_of: Option<NaiveDate>,
    /// Directory of additional catalog versions to publish before compiling
    /// (defaults to COMPILER_CATALOG_DIR)
    #[arg(long)]
    pub(crate) catalog_dir: Option<PathBuf>,
    /// Write the table of contents as CSV to this path
    #[arg(long)]
    pub(crate) toc_csv: Option<PathBuf>,
    /// Print the full package response as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogArgs {
    /// Show the rules of one forum's profile instead of the support matrix
    #[arg(long, value_parser = parse_forum)]
    pub(crate) forum: Option<Forum>,
    /// Subtype used to pick among the forum's profiles
    #[arg(long)]
    pub(crate) subtype: Option<String>,
    /// Catalog version (defaults to the latest published)
    #[arg(long)]
    pub(crate) version: Option<String>,
    /// Directory of additional catalog versions to publish first
    #[arg(long)]
    pub(crate) catalog_dir: Option<PathBuf>,
}

fn parse_mode(raw: &str) -> Result<CompilationOutputMode, String> {
    CompilationOutputMode::parse(raw)
        .ok_or_else(|| format!("unknown mode '{raw}'; use metadata_plan_only or compiled_pdf"))
}

fn parse_forum(raw: &str) -> Result<Forum, String> {
    Forum::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = Forum::ordered().iter().map(|forum| forum.as_str()).collect();
        format!("unknown forum '{raw}'; expected one of {}", known.join(", "))
    })
}

pub(crate) fn load_store(catalog_dir: Option<&Path>) -> Result<StaticCatalogStore, AppError> {
    let mut store = StaticCatalogStore::standard();
    if let Some(dir) = catalog_dir {
        let published = store.publish_dir(dir)?;
        tracing::info!(dir = %dir.display(), published, "catalog versions loaded");
    }
    Ok(store)
}

pub(crate) fn run_catalog(args: CatalogArgs) -> Result<(), AppError> {
    let store = load_store(args.catalog_dir.as_deref())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let Some(forum) = args.forum else {
        let matrix = store.support_matrix();
        writeln!(out, "Supported compilation profiles")?;
        for (forum, profiles) in &matrix.supported_profiles_by_forum {
            writeln!(out, "  {} ({})", forum.label(), forum.as_str())?;
            for profile in profiles {
                writeln!(
                    out,
                    "    - {} v{} catalogs [{}], latest {}",
                    profile.profile_id,
                    profile.profile_version,
                    profile.catalog_versions.join(", "),
                    profile.latest_catalog_version
                )?;
            }
        }
        writeln!(out, "Unsupported families")?;
        for family in &matrix.unsupported_profile_families {
            let subtype = family.subtype.as_deref().unwrap_or("*");
            writeln!(out, "  - {} / {}: {}", family.forum, subtype, family.reason)?;
        }
        return Ok(());
    };

    let profile = store.get_profile(forum, args.subtype.as_deref())?;
    let version = match args.version {
        Some(version) => version,
        None => store.latest_version(&profile.id)?,
    };
    let catalog = store.get_rules(&profile.id, &version)?;

    writeln!(
        out,
        "{} (profile v{}) catalog {} effective {}",
        profile.id, profile.version, catalog.version, catalog.effective_date
    )?;
    for section in &profile.sections {
        let required: Vec<&str> = section
            .required_document_types
            .iter()
            .map(|document_type| document_type.as_str())
            .collect();
        writeln!(
            out,
            "  [{}] {} required: {}",
            section.section_id,
            section.title,
            if required.is_empty() {
                "none".to_string()
            } else {
                required.join(", ")
            }
        )?;
    }
    for rule in catalog.rules_for(profile.subtype.as_deref()) {
        writeln!(
            out,
            "  {} {:<8} {} -> {}",
            rule.code,
            rule.severity.label(),
            rule.predicate.kind(),
            rule.source_url
        )?;
    }
    Ok(())
}

pub(crate) fn run_compile(args: CompileArgs) -> Result<(), AppError> {
    let settings = AppConfig::load()?.compilation;
    let record = read_matter(&args.matter)?;
    let matter_id = record.matter_id.clone();
    let service = offline_service(record, &settings, args.catalog_dir.as_deref())?;

    let readiness = service.readiness(
        &matter_id,
        &ReadinessRequest {
            as_of: args.as_of,
            ..ReadinessRequest::default()
        },
    )?;
    let response = service.package(
        &matter_id,
        &PackageRequest {
            compilation_output_mode: Some(args.mode),
            catalog_version: None,
            as_of: args.as_of,
        },
    )?;

    if let Some(path) = &args.toc_csv {
        write_toc_csv(path, &response.toc_entries)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &response).map_err(io::Error::from)?;
        writeln!(out)?;
        return Ok(());
    }

    render_summary(&mut out, &response, &readiness.missing_required_items)?;
    Ok(())
}

/// Same thresholds and catalog directory as the server; `--catalog-dir` overrides the
/// configured directory.
fn offline_service(
    record: MatterRecord,
    settings: &CompilationSettings,
    catalog_dir: Option<&Path>,
) -> Result<CompilationService<InMemoryMatterRepository, StaticCatalogStore>, AppError> {
    let store = load_store(catalog_dir.or(settings.catalog_dir.as_deref()))?;
    let repository = Arc::new(InMemoryMatterRepository::default());
    repository.upsert(record);
    Ok(CompilationService::new(
        repository,
        Arc::new(store),
        EvaluationConfig::from_settings(settings),
    ))
}

fn read_matter(path: &Path) -> Result<MatterRecord, AppError> {
    let file = File::open(path)?;
    let record = serde_json::from_reader(BufReader::new(file)).map_err(io::Error::from)?;
    Ok(record)
}

#[derive(Serialize)]
struct TocRow<'a> {
    position: usize,
    section: &'a str,
    document_type: &'a str,
    filename: &'a str,
    start_page: u32,
    end_page: u32,
    estimated: bool,
}

pub(crate) fn write_toc_csv(path: &Path, entries: &[TocEntry]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(io::Error::from)?;
    for entry in entries {
        writer
            .serialize(TocRow {
                position: entry.position,
                section: entry.section_id.as_deref().unwrap_or(""),
                document_type: entry.document_type.as_str(),
                filename: &entry.filename,
                start_page: entry.start_page,
                end_page: entry.end_page,
                estimated: entry.page_count_estimated,
            })
            .map_err(io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

fn render_summary(
    out: &mut impl Write,
    response: &PackageResponse,
    missing: &[String],
) -> io::Result<()> {
    writeln!(
        out,
        "Matter {} | {} v{} | catalog {} | {}",
        response.matter_id,
        response.compilation_profile.id,
        response.compilation_profile.version,
        response.catalog_version,
        if response.is_ready { "READY" } else { "NOT READY" }
    )?;
    if !missing.is_empty() {
        writeln!(out, "Missing required: {}", missing.join(", "))?;
    }

    writeln!(out, "\nTable of contents")?;
    for entry in &response.toc_entries {
        let marker = if entry.page_count_estimated { "*" } else { "" };
        writeln!(
            out,
            "  {:>3}. {:<40} pp. {}-{}{}",
            entry.position, entry.filename, entry.start_page, entry.end_page, marker
        )?;
    }
    writeln!(
        out,
        "  {} document(s), {} page(s)",
        response.pagination_summary.total_documents, response.pagination_summary.total_pages
    )?;

    if !response.rule_violations.is_empty() {
        writeln!(out, "\nRule violations")?;
        for violation in &response.rule_violations {
            writeln!(
                out,
                "  [{}] {}: {}",
                violation.severity.label(),
                violation.code,
                violation.message
            )?;
            writeln!(out, "      fix: {}", violation.remediation)?;
            writeln!(out, "      see: {}", violation.source_url)?;
        }
    }

    if !response.warnings.is_empty() {
        writeln!(out, "\nWarnings")?;
        for warning in &response.warnings {
            writeln!(out, "  {}: {}", warning.code, warning.message)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filing_binder::workflows::compilation::{
        DocumentType, MatterDocument, MatterId, UploadStatus,
    };

    fn entry(position: usize, start_page: u32, end_page: u32) -> TocEntry {
        TocEntry {
            position,
            file_id: format!("f-{position}"),
            document_type: DocumentType::from("exhibit"),
            filename: format!("exhibit-{position}.pdf"),
            section_id: Some("evidence".to_string()),
            start_page,
            end_page,
            page_count_estimated: position == 2,
        }
    }

    #[test]
    fn toc_csv_has_one_row_per_entry() {
        let path = std::env::temp_dir().join(format!("toc-{}.csv", std::process::id()));
        write_toc_csv(&path, &[entry(1, 1, 3), entry(2, 4, 4)]).expect("csv written");

        let contents = std::fs::read_to_string(&path).expect("csv readable");
        std::fs::remove_file(&path).ok();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "position,section,document_type,filename,start_page,end_page,estimated"
        );
        assert_eq!(lines[2], "2,evidence,exhibit,exhibit-2.pdf,4,4,true");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn parsers_reject_unknown_values() {
        assert!(parse_mode("zip").is_err());
        assert_eq!(parse_mode("pdf"), Ok(CompilationOutputMode::CompiledPdf));
        assert_eq!(parse_forum("RPD"), Ok(Forum::Rpd));
        assert!(parse_forum("tax_court")
            .unwrap_err()
            .contains("federal_court_jr_leave"));
    }

    fn rpd_record() -> MatterRecord {
        let mut record = MatterRecord::new(MatterId::new("rpd-offline"), Forum::Rpd);
        record.documents = ["application_for_protection", "hearing_notice", "document_list"]
            .iter()
            .enumerate()
            .map(|(index, label)| MatterDocument {
                file_id: format!("f-{index}"),
                filename: format!("{label}.pdf"),
                classification: DocumentType::from(*label),
                classification_confidence: 0.9,
                alternates: Vec::new(),
                ocr_confidence: Some(0.9),
                page_count: Some(2),
                upload_status: UploadStatus::Uploaded,
                issue_details: Vec::new(),
                upload_sequence: index as u64 + 1,
                language: None,
            })
            .collect();
        record
    }

    #[test]
    fn offline_service_uses_configured_thresholds_and_catalogs() {
        let dir = std::env::temp_dir().join(format!("offline-catalogs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("catalog dir");
        let catalog = serde_json::json!({
            "forum": "rpd",
            "profile_id": "rpd_claim",
            "version": "2030.1",
            "effective_date": "2030-01-01",
            "rules": [{
                "code": "RPD-001",
                "scope": "base",
                "predicate": { "kind": "document_present", "document_type": "application_for_protection" },
                "severity": "blocking",
                "remediation": "File the claim for refugee protection.",
                "source_url": "https://laws-lois.justice.gc.ca/eng/regulations/SOR-2012-256/"
            }]
        });
        std::fs::write(dir.join("rpd-2030.json"), catalog.to_string()).expect("catalog written");

        let settings = CompilationSettings {
            min_classification_confidence: 0.95,
            catalog_dir: Some(dir.clone()),
            ..CompilationSettings::default()
        };
        let service = offline_service(rpd_record(), &settings, None).expect("service builds");
        let state = service
            .readiness(&MatterId::new("rpd-offline"), &ReadinessRequest::default())
            .expect("readiness");
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(state.catalog_version, "2030.1");
        assert!(state.is_ready, "{:?}", state.blocking_issues);
        assert!(!state.warnings.is_empty());
    }
}
