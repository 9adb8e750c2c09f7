//! Tests for the per-dialog outbound facade.

use botgate::dialog::DialogApi;
use botgate::types::{DialogMessage, FinishReason, MultichoiceOption};

use crate::support::{ApiCall, RecordingApi};

fn sent(token: &str, message: DialogMessage) -> ApiCall {
    ApiCall::Send {
        dialog_token: token.to_owned(),
        message,
    }
}

#[tokio::test]
async fn send_methods_map_to_dialog_messages() {
    let api = RecordingApi::new();
    let dialog = DialogApi::new("dlg-1", api.clone());

    let first = dialog.send_text_message("hello").await;
    let second = dialog.send_text_question("name?").await;
    let options = vec![
        MultichoiceOption::new("Yes", "y", true),
        MultichoiceOption::new("No", "n", false),
    ];
    let third = dialog
        .send_multichoice_question("continue?", options.clone())
        .await;
    let fourth = dialog.send_rating_question("how was it?").await;

    assert_eq!(first.ok().as_deref(), Some("action-1"));
    assert_eq!(second.ok().as_deref(), Some("action-2"));
    assert_eq!(third.ok().as_deref(), Some("action-3"));
    assert_eq!(fourth.ok().as_deref(), Some("action-4"));
    assert_eq!(
        api.calls(),
        vec![
            sent("dlg-1", DialogMessage::Text { text: "hello".to_owned() }),
            sent("dlg-1", DialogMessage::TextQuestion { text: "name?".to_owned() }),
            sent(
                "dlg-1",
                DialogMessage::MultichoiceQuestion {
                    text: "continue?".to_owned(),
                    options,
                }
            ),
            sent(
                "dlg-1",
                DialogMessage::RatingQuestion {
                    text: "how was it?".to_owned()
                }
            ),
        ]
    );
}

#[tokio::test]
async fn terminal_calls_map_to_finish_reasons() {
    let api = RecordingApi::new();
    let dialog = DialogApi::new("dlg-9", api.clone());

    assert!(dialog.hand_off().await.is_ok());
    assert!(dialog.solved().await.is_ok());
    assert!(dialog.abort().await.is_ok());

    let reasons: Vec<FinishReason> = api
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::Finish {
                dialog_token,
                reason,
            } if dialog_token == "dlg-9" => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![FinishReason::HandOff, FinishReason::Solved, FinishReason::Aborted]
    );
}

#[tokio::test]
async fn platform_errors_reach_the_caller() {
    let dialog = DialogApi::new("dlg-1", RecordingApi::failing());

    assert!(dialog.send_text_message("hello").await.is_err());
    assert!(dialog.hand_off().await.is_err());
}

#[tokio::test]
async fn facade_is_bound_to_its_token() {
    let dialog = DialogApi::new("dlg-7", RecordingApi::new());
    assert_eq!(dialog.token(), "dlg-7");
    assert_eq!(dialog.clone().token(), "dlg-7");
}
