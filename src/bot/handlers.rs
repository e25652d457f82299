//! Per-message handling: commands and homework photo submissions.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::models::schedule::next_day_name;
use crate::services::contacts;
use crate::services::status::status_for;
use crate::services::submissions::{correlate, CaptionCache, Correlation};
use crate::services::summary::{format_status, photo_caption};
use crate::store::{HomeworkStore, StoreError};
use crate::telegram::client::{Client, TelegramError};
use crate::telegram::types::{BotCommand, Message};

/// The static command list registered with the platform for discovery.
pub const COMMANDS: [BotCommand; 5] = [
    BotCommand {
        command: "start",
        description: "Запустить бота и увидеть инструкции",
    },
    BotCommand {
        command: "help",
        description: "Показать сообщение с помощью",
    },
    BotCommand {
        command: "addstudent",
        description: "Добавить студента в ваши контакты (для родителей)",
    },
    BotCommand {
        command: "checkhw",
        description: "Проверить статус домашнего задания ваших студентов (для родителей)",
    },
    BotCommand {
        command: "schedule",
        description: "Посмотреть расписание на завтра",
    },
];

#[derive(Debug, Error)]
enum SaveError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TelegramError),
}

pub struct Handler {
    client: Client,
    store: Arc<HomeworkStore>,
    captions: CaptionCache,
}

impl Handler {
    pub fn new(client: Client, store: Arc<HomeworkStore>, captions: CaptionCache) -> Self {
        Self {
            client,
            store,
            captions,
        }
    }

    pub async fn register_commands(&self) -> Result<(), TelegramError> {
        self.client.set_my_commands(&COMMANDS).await
    }

    /// Entry point for one inbound message; runs on its own task.
    pub async fn handle_message(&self, message: Message) {
        let Some(from) = message.from.as_ref() else {
            // Channel posts and the like carry no sender; nothing to do.
            return;
        };
        let user_id = from.id.to_string();
        let username = from.username.clone().unwrap_or_default();
        let chat_id = message.chat.id;

        if let Err(e) = self.ensure_initialized(&user_id, &username).await {
            error!(user = %user_id, "failed to initialize user: {e}");
            self.reply(
                chat_id,
                "Извините, произошла ошибка при инициализации вашего аккаунта. Пожалуйста, попробуйте позже.",
            )
            .await;
            return;
        }

        if let Some((command, args)) = message.command() {
            self.handle_command(chat_id, &user_id, command, args).await;
        } else {
            self.handle_submission(&message, &user_id).await;
        }
    }

    /// Idempotent per-interaction init: create-or-reconcile the user record,
    /// then install the weekly template on first use.
    async fn ensure_initialized(&self, user_id: &str, username: &str) -> Result<(), StoreError> {
        self.store.ensure_user(user_id, username).await?;
        self.store.ensure_schedule(user_id).await
    }

    async fn handle_command(&self, chat_id: i64, user_id: &str, command: &str, args: &str) {
        match command {
            "start" => self.cmd_start(chat_id).await,
            "help" => self.cmd_help(chat_id).await,
            "schedule" => self.cmd_schedule(chat_id, user_id).await,
            "addstudent" => self.cmd_add_student(chat_id, user_id, args).await,
            "checkhw" => self.cmd_check_homework(chat_id, user_id).await,
            _ => {
                self.reply(
                    chat_id,
                    "Неизвестная команда. Используйте /help, чтобы увидеть доступные команды.",
                )
                .await
            }
        }
    }

    async fn cmd_start(&self, chat_id: i64) {
        let next_day = next_day_name();
        self.reply(
            chat_id,
            &format!(
                "Добро пожаловать в Бота для домашних заданий!\n\n\
                 Чтобы отправить домашку на завтра ({next_day}):\n\
                 Отправьте снимки с названием предмета в подписи\n\
                 Пример: 'Математика'\n\n\
                 2. Родители могут добавлять студентов с помощью команды `/addstudent @username`.\n\
                 3. Родители могут проверять статус домашнего задания с помощью команды `/checkhw`.\n\n\
                 Используйте /help, чтобы увидеть все доступные команды."
            ),
        )
        .await;
    }

    async fn cmd_help(&self, chat_id: i64) {
        let help = "📚 *Помощь по Боту для домашних заданий*\n\n\
            Вот доступные команды:\n\n\
            */start* - Запустить бота и увидеть инструкции.\n\
            */help* - Показать это сообщение с помощью.\n\
            */addstudent @username* - Добавить студента в ваши контакты (для родителей).\n\
            */checkhw* - Проверить статус домашнего задания ваших студентов (для родителей).\n\
            */schedule* - Посмотреть расписание на завтра.\n\n\
            Чтобы отправить домашку:\n\
            1. Сделайте фото(снимки) вашего домашнего задания.\n\
            2. Добавьте подпись с названием предмета (например, 'Математика').\n\
            3. Отправьте фото(снимки) боту.\n\n\
            Пример: Отправьте фото с подписью 'Математика', чтобы отправить домашку по математике.";
        if let Err(e) = self.client.send_message_markdown(chat_id, help).await {
            error!(chat = chat_id, "failed to send help: {e}");
        }
    }

    async fn cmd_schedule(&self, chat_id: i64, user_id: &str) {
        let next_day = next_day_name();
        match self.store.schedule_for_day(user_id, next_day).await {
            Ok(day) => {
                let mut text = format!("Завтрашнее ({next_day}) расписание:\n");
                for (i, subject) in day.subjects.iter().enumerate() {
                    text.push_str(&format!("{}. {}\n", i + 1, subject.name));
                }
                self.reply(chat_id, &text).await;
            }
            Err(e) => {
                error!(user = %user_id, day = next_day, "failed to fetch schedule: {e}");
                self.reply(chat_id, "Ошибка получения расписания. Попробуйте позже").await;
            }
        }
    }

    async fn cmd_add_student(&self, chat_id: i64, user_id: &str, args: &str) {
        let Some(handle) = args.split_whitespace().next() else {
            self.reply(
                chat_id,
                "Пожалуйста, укажите Telegram-имя пользователя студента.\nИспользование: /addstudent @username",
            )
            .await;
            return;
        };
        match contacts::add_student(&self.store, user_id, handle).await {
            Ok(handle) => {
                self.reply(
                    chat_id,
                    &format!(
                        "Успешно добавлен студент {handle} в ваши контакты. \
                         Теперь вы можете проверять его домашку с помощью /checkhw"
                    ),
                )
                .await;
            }
            Err(StoreError::StudentNotFound(handle)) => {
                self.reply(
                    chat_id,
                    &format!("Студент {handle} не найден. Он должен сначала написать боту."),
                )
                .await;
            }
            Err(e) => {
                error!(guardian = %user_id, "failed to add student: {e}");
                self.reply(chat_id, "Не удалось добавить студента, попробуйте позже").await;
            }
        }
    }

    async fn cmd_check_homework(&self, chat_id: i64, user_id: &str) {
        let guardian = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(e) => {
                error!(user = %user_id, "failed to load guardian: {e}");
                self.reply(
                    chat_id,
                    "Не удалось получить вашу информацию. Пожалуйста, попробуйте снова.",
                )
                .await;
                return;
            }
        };
        if guardian.contacts.is_empty() {
            self.reply(
                chat_id,
                "Вы еще не добавили ни одного студента. Используйте команду /addstudent @username, чтобы добавить студента.",
            )
            .await;
            return;
        }

        let day = next_day_name();
        for student in &guardian.contacts {
            match status_for(&self.store, student, day).await {
                Ok(status) => {
                    self.reply(chat_id, &format_status(student, &status)).await;
                    for (subject, submissions) in &status.submissions {
                        self.reply(chat_id, &format!("\n📚 Фото домашки для {subject}:")).await;
                        for submission in submissions {
                            if let Err(e) = self
                                .client
                                .send_photo(
                                    chat_id,
                                    submission.photo.clone(),
                                    &photo_caption(subject, submission),
                                )
                                .await
                            {
                                error!(student = %student, id = %submission.id, "failed to send homework photo: {e}");
                                self.reply(chat_id, "Не удалось отправить некоторые фото домашнего задания")
                                    .await;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(student = %student, "failed to check homework: {e}");
                    self.reply(
                        chat_id,
                        &format!("Не удалось проверить домашку для студента {student}"),
                    )
                    .await;
                }
            }
        }
    }

    /// The photo flow: correlate the event into a submission decision, then
    /// download and file the photo.
    async fn handle_submission(&self, message: &Message, user_id: &str) {
        let chat_id = message.chat.id;
        let (subject, day, acknowledge) = match correlate(message, &self.captions) {
            Correlation::NoPhoto => {
                self.reply(
                    chat_id,
                    "Пожалуйста, отправьте снимки вашего домашнего задания и подпишите названием предмета.",
                )
                .await;
                return;
            }
            Correlation::NoCaption => {
                self.reply(
                    chat_id,
                    "Пожалуйста, добавьте подпись с названием предмета (например, 'Математика')",
                )
                .await;
                return;
            }
            Correlation::Submit {
                subject,
                day,
                acknowledge,
            } => (subject, day, acknowledge),
        };

        if acknowledge {
            self.reply(chat_id, &format!("Обрабатываю фотографии для {day} {subject}...")).await;
        }

        match self.save_photo(message, user_id, day, &subject).await {
            Ok(id) => {
                info!(user = %user_id, submission = %id, "homework saved");
                if acknowledge {
                    self.reply(chat_id, &format!("Успешно сохранил домашку для {day} {subject}!")).await;
                }
            }
            Err(e) => {
                error!(user = %user_id, subject = %subject, "failed to save homework: {e}");
                // Caption-less album members fail silently; their captioned
                // sibling already reports for the album.
                if acknowledge {
                    let text = match &e {
                        SaveError::Store(store_err) if store_err.is_not_found() => format!(
                            "Не нашёл предмет '{subject}' в расписании на {day}. Проверьте /schedule"
                        ),
                        SaveError::Store(_) => "Ошибка сохранения фото, попробуйте позже".to_string(),
                        SaveError::Transport(_) => "Ошибка загрузки фото, попробуйте позже".to_string(),
                    };
                    self.reply(chat_id, &text).await;
                }
            }
        }
    }

    async fn save_photo(
        &self,
        message: &Message,
        user_id: &str,
        day: &str,
        subject: &str,
    ) -> Result<String, SaveError> {
        let Some(photo) = message.largest_photo() else {
            return Err(SaveError::Transport(TelegramError::Api(
                "photo message without photo sizes".into(),
            )));
        };
        let file = self.client.get_file(&photo.file_id).await?;
        let Some(path) = file.file_path else {
            return Err(SaveError::Transport(TelegramError::Api(format!(
                "file {} has no download path",
                file.file_id
            ))));
        };
        let bytes = self.client.download(&path).await?;
        let id = self
            .store
            .record_submission(user_id, day, subject, bytes.to_vec())
            .await?;
        Ok(id)
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.client.send_message(chat_id, text).await {
            error!(chat = chat_id, "failed to send message: {e}");
        }
    }
}
