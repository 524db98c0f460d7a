use iocraft::prelude::*;

use crate::{dicom_json::StowReport, qido::SeriesMatch};

pub const NO_INSTANCE_UPLOADED: &str = "No instance was uploaded!";
pub const NO_SERIES_MATCHED: &str = "No series matched the query";

#[derive(Default, Props)]
pub struct MessageProps {
    pub message: String,
}

#[component]
pub fn ErrorMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(color: Color::Red, weight: Weight::Bold, content: "✗ ")
            Text(content: props.message.clone())
        }
    }
}

#[component]
pub fn WarningMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(color: Color::Yellow, weight: Weight::Bold, content: "! ")
            Text(content: props.message.clone())
        }
    }
}

#[component]
pub fn SuccessMessage(props: &MessageProps) -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Row) {
            Text(color: Color::Green, weight: Weight::Bold, content: "✓ ")
            Text(content: props.message.clone())
        }
    }
}

#[component]
pub fn ConfigHeader() -> impl Into<AnyElement<'static>> {
    element! {
        View(flex_direction: FlexDirection::Column, margin_bottom: 1) {
            Text(weight: Weight::Bold, content: "dicomweb-samples configuration")
            Text(color: Color::Grey, content: "Press Enter to keep the value shown in brackets.")
        }
    }
}

#[derive(Default, Props)]
pub struct InputPromptProps {
    pub prompt: String,
    pub default: Option<String>,
    pub description: Option<String>,
}

#[component]
pub fn InputPrompt(props: &InputPromptProps) -> impl Into<AnyElement<'static>> {
    let prompt = match &props.default {
        Some(default) => format!("{} [{}]", props.prompt, default),
        None => props.prompt.clone(),
    };

    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(weight: Weight::Bold, content: prompt)
            #(props.description.as_ref().map(|description| element! {
                Text(color: Color::Grey, content: description.clone())
            }))
        }
    }
}

#[derive(Default, Props)]
pub struct StowReportViewProps {
    pub report: StowReport,
}

#[component]
pub fn StowReportView(props: &StowReportViewProps) -> impl Into<AnyElement<'static>> {
    let report = &props.report;
    let (study, study_color) = match &report.study_url {
        Some(url) => (url.clone(), Color::Reset),
        None => (NO_INSTANCE_UPLOADED.to_string(), Color::Yellow),
    };

    element! {
        View(flex_direction: FlexDirection::Column) {
            View(flex_direction: FlexDirection::Column, margin_top: 1) {
                Text(weight: Weight::Bold, content: "WADO-RS URL of the uploaded instances:")
                #(report.instance_urls.iter().map(|url| element! {
                    Text(content: url.clone())
                }))
            }
            #((!report.failed_instances.is_empty()).then(|| element! {
                View(flex_direction: FlexDirection::Column, margin_top: 1) {
                    Text(weight: Weight::Bold, color: Color::Red, content: "Instances rejected by the server:")
                    #(report.failed_instances.iter().map(|failed| element! {
                        Text(content: format!(
                            "{} (failure reason {})",
                            failed.sop_instance_uid.as_deref().unwrap_or("<unknown instance>"),
                            failed.failure_reason.as_deref().unwrap_or("<none>"),
                        ))
                    }))
                }
            }))
            View(flex_direction: FlexDirection::Column, margin_top: 1) {
                Text(weight: Weight::Bold, content: "WADO-RS URL of the study:")
                Text(color: study_color, content: study)
            }
        }
    }
}

#[derive(Default, Props)]
pub struct SeriesListProps {
    pub matches: Vec<SeriesMatch>,
}

#[component]
pub fn SeriesList(props: &SeriesListProps) -> impl Into<AnyElement<'static>> {
    if props.matches.is_empty() {
        return element! {
            View {
                Text(color: Color::Yellow, content: NO_SERIES_MATCHED)
            }
        };
    }

    element! {
        View(flex_direction: FlexDirection::Column) {
            Text(color: Color::Grey, content: "PatientID - PatientName - StudyDescription - SeriesDescription - RetrieveURL")
            #(props.matches.iter().map(|series| element! {
                Text(content: series.summary())
            }))
        }
    }
}
