use assert_matches::assert_matches;

use parviz::domain::{DEFAULT_JOB_URL, Host, JobRef};
use parviz::error::VizError;

#[test]
fn default_job_url_parses() {
    let job: JobRef = DEFAULT_JOB_URL.parse().unwrap();
    assert_eq!(job.owner, "devang");
    assert_eq!(job.project, "demo");
    assert_eq!(job.job_id, "3e6bef53-179b-4fc4-aeed-03e49816e5e8");
}

#[test]
fn job_url_segments_at_fixed_offsets() {
    let job: JobRef = "https://another.cloud/extra/prefix/acme/projects/tower/jobs/j-9"
        .parse()
        .unwrap();
    assert_eq!(job.owner, "acme");
    assert_eq!(job.project, "tower");
    assert_eq!(job.job_id, "j-9");
}

#[test]
fn bad_urls_are_user_errors() {
    assert_matches!("".parse::<JobRef>(), Err(VizError::MissingJobUrl));
    assert_matches!(
        "https://host/jobs/only".parse::<JobRef>(),
        Err(VizError::InvalidJobUrl(_))
    );
}

#[test]
fn host_defaults_to_web() {
    assert_eq!(Host::default(), Host::Web);
    assert_eq!("RHINO".parse::<Host>().unwrap(), Host::Rhino);
}
