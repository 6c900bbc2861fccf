use crate::infra::{in_memory_service, parse_date, parse_locale, parse_status};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::path::PathBuf;
use student_portal::config::AppConfig;
use student_portal::error::AppError;
use student_portal::workflows::requests::{
    build_timeline, ApplicantDetails, Attachment, FileType, Locale, OwnerId, RequestStatus,
    RequestSubmission, Role, ServiceType, Session, StatusDescriptor,
};

const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n% sample passport scan\n%%EOF\n";

#[derive(Args, Debug)]
pub(crate) struct TimelineArgs {
    /// Persisted status value; unknown or missing values render no progress
    #[arg(long)]
    pub(crate) status: Option<String>,
    /// Day the request was created (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) created_on: Option<NaiveDate>,
    /// Display language (en or ar)
    #[arg(long, value_parser = parse_locale, default_value = "en")]
    pub(crate) locale: Locale,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Passport scan to attach. A bundled sample PDF is used when omitted.
    #[arg(long)]
    pub(crate) attachment: Option<PathBuf>,
    /// Status an administrator moves the request to after submission
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<RequestStatus>,
    /// Display language (en or ar)
    #[arg(long, value_parser = parse_locale, default_value = "en")]
    pub(crate) locale: Locale,
}

pub(crate) fn run_timeline(args: TimelineArgs) -> Result<(), AppError> {
    let TimelineArgs {
        status,
        created_on,
        locale,
    } = args;

    let created_on = created_on.unwrap_or_else(|| Local::now().date_naive());
    let created_at = created_on.and_time(chrono::NaiveTime::MIN).and_utc();
    let timeline = build_timeline(status.as_deref(), created_at, locale);

    println!(
        "Timeline for status '{}' created {}",
        status.as_deref().unwrap_or("<none>"),
        created_on
    );
    render_timeline(&timeline);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        attachment,
        status,
        locale,
    } = args;

    let config = AppConfig::load()?;
    let service = in_memory_service(&config.uploads, &config.backend);
    let passport = load_attachment(attachment)?;

    println!("Student services request demo");
    println!(
        "- Upload policy: {} bytes max | {}",
        config.uploads.max_upload_size_bytes,
        config.uploads.allowed_mime_types.join(", ")
    );

    let student = Session::sign_in(OwnerId("demo-student".to_string()), Role::Student);
    let submission = RequestSubmission {
        service_type: ServiceType::PassportRenewal,
        applicant: ApplicantDetails {
            first_name: "Layla".to_string(),
            last_name: "Mansour".to_string(),
            university_name: Some("Ain Shams University".to_string()),
            major: Some("Civil Engineering".to_string()),
            additional_notes: None,
        },
        attachments: vec![passport],
    };

    let receipt = match service.submit(Some(&student), submission).await {
        Ok(receipt) => receipt,
        Err(err) => {
            println!("  Submission failed: {}", err);
            if let Some(number) = err.request_number() {
                println!("  Request {} was created; quote it when following up", number);
            }
            return Ok(());
        }
    };
    println!(
        "- Filed {} on {} ({} file(s))",
        receipt.request_number,
        receipt.submission_date,
        receipt.files.len()
    );
    for file in &receipt.files {
        println!(
            "    - {} {} ({} bytes) at {}",
            file.file_type, file.file_name, file.size_bytes, file.file_path
        );
    }

    let tracked = service
        .track(
            receipt.request_number.as_str(),
            receipt.submission_date,
            locale,
        )
        .await?;
    println!("\nTracking {} -> {}", receipt.request_number, tracked.request.status_label);
    render_timeline(&tracked.timeline);

    if let Some(status) = status {
        let admin = Session::sign_in(OwnerId("demo-admin".to_string()), Role::Admin);
        service
            .update_status(
                Some(&admin),
                &receipt.request_id,
                status,
                Some(format!("Moved to {} by the demo", status.as_str())),
            )
            .await?;
        admin.sign_out();

        let tracked = service
            .track(
                receipt.request_number.as_str(),
                receipt.submission_date,
                locale,
            )
            .await?;
        println!("\nAfter review -> {}", tracked.request.status_label);
        render_timeline(&tracked.timeline);
        match serde_json::to_string_pretty(&tracked.request) {
            Ok(json) => println!("  Public status payload:\n{}", json),
            Err(err) => println!("  Public status payload unavailable: {}", err),
        }
    }

    student.sign_out();
    Ok(())
}

fn load_attachment(path: Option<PathBuf>) -> Result<Attachment, AppError> {
    let Some(path) = path else {
        return Ok(Attachment {
            file_type: FileType::Passport,
            file_name: "passport-sample.pdf".to_string(),
            content_type: mime_guess::mime::APPLICATION_PDF.to_string(),
            bytes: SAMPLE_PDF.to_vec(),
        });
    };

    let bytes = std::fs::read(&path)?;
    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "passport".to_string());

    Ok(Attachment {
        file_type: FileType::Passport,
        file_name,
        content_type,
        bytes,
    })
}

fn render_timeline(timeline: &[StatusDescriptor]) {
    for entry in timeline {
        let marker = if entry.complete { "x" } else { " " };
        println!("  [{}] {:<14} {}", marker, entry.label, entry.date);
    }
}
