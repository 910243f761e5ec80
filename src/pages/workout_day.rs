use std::rc::Rc;

use chrono::NaiveDate;
use leptos::*;

use crate::app::BrowserSession;
use crate::editor::{DayView, ExerciseRow, SetField, SetRow};
use crate::sync::{EditOutcome, SyncStatus};

fn today() -> NaiveDate {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
        .unwrap_or_default()
}

fn format_weight(w: f64) -> String {
    if w.fract() == 0.0 {
        format!("{:.0}", w)
    } else {
        format!("{:.1}", w)
    }
}

fn notice_for(outcome: &EditOutcome) -> Option<String> {
    match outcome {
        EditOutcome::Synced(_) => None,
        EditOutcome::Queued => Some("Saved on this device. Will sync when back online.".into()),
        EditOutcome::Deferred(e) if e.is_retryable() => {
            Some(format!("Saved on this device. Sync failed, will retry: {}", e))
        }
        EditOutcome::Deferred(e) => Some(format!("Saved on this device, but the server rejected it: {}", e)),
    }
}

#[component]
pub fn WorkoutDay(session: Rc<BrowserSession>, on_logout: Callback<()>) -> impl IntoView {
    let editor = session.editor();
    let email = session.auth().user.email.clone();

    let (date, set_date) = create_signal(today());
    let (day, set_day) = create_signal(Option::<DayView>::None);
    let (notice, set_notice) = create_signal(Option::<String>::None);
    let (new_exercise, set_new_exercise) = create_signal(String::new());

    // Re-render the shown date from the cache.
    let show_cached = {
        let editor = editor.clone();
        move || {
            if let Some(current) = date.try_get_untracked() {
                let _ = set_day.try_set(Some(editor.cached_view(current)));
            }
        }
    };

    // Cache first, then the authoritative copy when online.
    let reload = {
        let editor = editor.clone();
        move |current: NaiveDate| {
            let editor = editor.clone();
            spawn_local(async move {
                editor
                    .load(current, |view| {
                        if date.try_get_untracked() == Some(view.date) {
                            let _ = set_day.try_set(Some(view));
                        }
                    })
                    .await;
            });
        }
    };

    let on_date = reload.clone();
    create_effect(move |_| on_date(date.get()));

    let after_sweep = reload.clone();
    spawn_local(session.reconciler(move |report| {
        if report.is_clean() {
            log::info!("reconciled {} day(s)", report.synced.len());
        } else {
            log::warn!("{} day(s) still pending after reconcile", report.failed.len());
        }
        if let Some(current) = date.try_get_untracked() {
            after_sweep(current);
        }
    }));

    let startup = session.clone();
    let after_startup = reload.clone();
    spawn_local(async move {
        if let Some(report) = startup.sync_now().await {
            log::info!("startup sweep: {} synced, {} failed", report.synced.len(), report.failed.len());
            if let Some(current) = date.try_get_untracked() {
                after_startup(current);
            }
        }
    });

    let on_blur = {
        let editor = editor.clone();
        let refresh = show_cached.clone();
        move |exercise: String, index: u32, field: SetField, raw: String| {
            let editor = editor.clone();
            let refresh = refresh.clone();
            let current = date.get_untracked();
            spawn_local(async move {
                match editor.blur(current, &exercise, index, field, &raw).await {
                    Ok(Some(outcome)) => {
                        set_notice.set(notice_for(&outcome));
                        refresh();
                    }
                    Ok(None) => {}
                    Err(e) => set_notice.set(Some(e.to_string())),
                }
            });
        }
    };

    let on_remove = {
        let editor = editor.clone();
        let refresh = show_cached.clone();
        move |exercise: String| {
            let editor = editor.clone();
            let refresh = refresh.clone();
            let current = date.get_untracked();
            spawn_local(async move {
                match editor.engine().delete_record(current, &exercise).await {
                    Ok(()) => {
                        set_notice.set(None);
                        refresh();
                    }
                    Err(e) => set_notice.set(Some(e.to_string())),
                }
            });
        }
    };

    let add_set = move |exercise: String| {
        set_day.update(|d| {
            if let Some(row) = d.as_mut().and_then(|d| d.exercises.iter_mut().find(|e| e.name == exercise)) {
                let index = row.sets.len() as u32;
                row.sets.push(SetRow { index, reps: None, weight: None });
            }
        });
    };

    let add_exercise = move |_| {
        let name = new_exercise.get().trim().to_string();
        if name.is_empty() {
            return;
        }
        set_day.update(|d| {
            if let Some(d) = d.as_mut() {
                if d.exercise(&name).is_none() {
                    d.exercises.push(ExerciseRow {
                        name: name.clone(),
                        target: None,
                        sets: vec![SetRow { index: 0, reps: None, weight: None }],
                    });
                }
            }
        });
        set_new_exercise.set(String::new());
    };

    view! {
        <div class="workout-day">
            <div class="workout-header">
                <input
                    type="date"
                    class="date-input"
                    prop:value=move || date.get().format("%Y-%m-%d").to_string()
                    on:change=move |ev| {
                        match NaiveDate::parse_from_str(&event_target_value(&ev), "%Y-%m-%d") {
                            Ok(d) => set_date.set(d),
                            Err(e) => log::warn!("ignoring date input: {}", e),
                        }
                    }
                />
                {move || day.get().map(|d| match d.status {
                    SyncStatus::Synced => view! { <span class="sync-status synced">"Synced"</span> },
                    SyncStatus::Pending => view! { <span class="sync-status pending">"Pending sync"</span> },
                })}
                <span class="account-email">{email}</span>
                <button class="logout-btn" on:click=move |_| on_logout.call(())>"Sign out"</button>
            </div>

            {move || notice.get().map(|n| view! { <div class="sync-notice">{n}</div> })}

            {move || match day.get() {
                None => view! { <div class="loading">"Loading..."</div> }.into_view(),
                Some(current) if current.exercises.is_empty() => {
                    view! { <div class="rest-day">"Rest day"</div> }.into_view()
                }
                Some(current) => current.exercises.into_iter().map(|exercise| {
                    let name = exercise.name.clone();
                    let target_text = exercise.target.as_ref().map(|t| {
                        format!("{} x {} @ {} kg", t.sets, t.reps, format_weight(t.weight))
                    });
                    let reps_hint = exercise.target.as_ref().map(|t| t.reps.to_string()).unwrap_or_default();
                    let weight_hint = exercise.target.as_ref().map(|t| format_weight(t.weight)).unwrap_or_default();
                    let remove = on_remove.clone();
                    let remove_name = name.clone();
                    let extend = add_set.clone();
                    let extend_name = name.clone();

                    let rows = exercise.sets.into_iter().map(|set| {
                        let index = set.index;
                        let reps_blur = on_blur.clone();
                        let reps_name = name.clone();
                        let weight_blur = on_blur.clone();
                        let weight_name = name.clone();
                        view! {
                            <div class="set-row">
                                <span class="set-index">{index + 1}</span>
                                <input
                                    type="text"
                                    inputmode="numeric"
                                    class="set-input reps"
                                    placeholder=reps_hint.clone()
                                    prop:value=set.reps.map(|r| r.to_string()).unwrap_or_default()
                                    on:blur=move |ev| reps_blur(reps_name.clone(), index, SetField::Reps, event_target_value(&ev))
                                />
                                <span class="set-x">"x"</span>
                                <input
                                    type="text"
                                    inputmode="decimal"
                                    class="set-input weight"
                                    placeholder=weight_hint.clone()
                                    prop:value=set.weight.map(format_weight).unwrap_or_default()
                                    on:blur=move |ev| weight_blur(weight_name.clone(), index, SetField::Weight, event_target_value(&ev))
                                />
                                <span class="set-unit">"kg"</span>
                            </div>
                        }
                    }).collect_view();

                    view! {
                        <section class="exercise-card">
                            <div class="exercise-header">
                                <span class="exercise-name">{name}</span>
                                {target_text.map(|t| view! { <span class="exercise-target">{t}</span> })}
                                <button class="exercise-remove" on:click=move |_| remove(remove_name.clone())>"Remove"</button>
                            </div>
                            {rows}
                            <button class="add-set" on:click=move |_| extend(extend_name.clone())>"+ set"</button>
                        </section>
                    }
                }).collect_view(),
            }}

            <div class="add-exercise">
                <input
                    type="text"
                    class="exercise-input"
                    placeholder="Add exercise"
                    on:input=move |ev| set_new_exercise.set(event_target_value(&ev))
                    prop:value=new_exercise
                />
                <button class="add-exercise-btn" on:click=add_exercise>"Add"</button>
            </div>
        </div>
    }
}
