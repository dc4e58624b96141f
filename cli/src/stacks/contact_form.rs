use crate::config::Config;
use crate::naming;
use crate::stacks::Stack;
use crate::stage::StageConfig;

/// Contact form backend: a function writing submissions into a table
///
/// The handler is small enough to inline into the template, which keeps the
/// stack deployable before any build artifact exists.
pub fn synthesize(config: &Config, stage: &StageConfig) -> Stack {
    let stage_name = stage.name.as_str();
    let name = naming::contact_form_stack_name(stage_name, &stage.region);
    let function_name = format!("{}-contact-{}", config.project, stage_name.to_lowercase());

    // Submissions survive stack deletion in prod only
    let deletion_policy = if stage.is_production {
        "Retain"
    } else {
        "Delete"
    };

    let template = format!(
        "Description: Contact form backend for the {stage_name} stage
Resources:
    SubmissionsTable:
        Type: AWS::DynamoDB::Table
        DeletionPolicy: {deletion_policy}
        UpdateReplacePolicy: {deletion_policy}
        Properties:
            TableName: {function_name}
            AttributeDefinitions:
                - AttributeName: id
                  AttributeType: S
            KeySchema:
                - AttributeName: id
                  KeyType: HASH
            ProvisionedThroughput:
                ReadCapacityUnits: 5
                WriteCapacityUnits: 5
    HandlerRole:
        Type: AWS::IAM::Role
        Properties:
            AssumeRolePolicyDocument:
                Version: '2012-10-17'
                Statement:
                    - Effect: Allow
                      Principal:
                          Service:
                              - lambda.amazonaws.com
                      Action:
                          - sts:AssumeRole
            Path: \"/\"
            Policies:
                - PolicyName: AppendToLogsPolicy
                  PolicyDocument:
                      Version: '2012-10-17'
                      Statement:
                          - Effect: Allow
                            Action:
                                - logs:CreateLogGroup
                                - logs:CreateLogStream
                                - logs:PutLogEvents
                            Resource: \"*\"
                - PolicyName: SubmissionsTablePolicy
                  PolicyDocument:
                      Version: '2012-10-17'
                      Statement:
                          - Effect: Allow
                            Action:
                                - dynamodb:PutItem
                                - dynamodb:DescribeTable
                            Resource: !GetAtt SubmissionsTable.Arn
    Handler:
        Type: AWS::Lambda::Function
        Properties:
            FunctionName: {function_name}
            Handler: index.handler
            Runtime: nodejs20.x
            MemorySize: 128
            Timeout: 10
            Role: !GetAtt HandlerRole.Arn
            Environment:
                Variables:
                    TABLE_NAME: !Ref SubmissionsTable
                    STAGE: {stage_name}
            Code:
                ZipFile: |
                    const {{ DynamoDBClient, PutItemCommand }} = require('@aws-sdk/client-dynamodb');
                    const client = new DynamoDBClient({{}});
                    exports.handler = async (event) => {{
                        const body = JSON.parse(event.body || '{{}}');
                        if (!body.email || !body.message) {{
                            return {{ statusCode: 400, body: JSON.stringify({{ error: 'email and message are required' }}) }};
                        }}
                        const id = `${{Date.now()}}-${{Math.random().toString(16).slice(2)}}`;
                        await client.send(new PutItemCommand({{
                            TableName: process.env.TABLE_NAME,
                            Item: {{
                                id: {{ S: id }},
                                email: {{ S: body.email }},
                                name: {{ S: body.name || '' }},
                                message: {{ S: body.message }},
                                receivedAt: {{ S: new Date().toISOString() }},
                            }},
                        }}));
                        return {{ statusCode: 200, body: JSON.stringify({{ id }}) }};
                    }};
    HandlerUrl:
        Type: AWS::Lambda::Url
        Properties:
            AuthType: NONE
            TargetFunctionArn: !Ref Handler
    HandlerUrlPermission:
        Type: AWS::Lambda::Permission
        Properties:
            Action: lambda:InvokeFunctionUrl
            FunctionUrlAuthType: 'NONE'
            FunctionName: !Ref Handler
            Principal: \"*\"
Outputs:
    SubmissionsTableName:
        Value: !Ref SubmissionsTable
        Export:
            Name: {table_name_export}
    SubmissionsTableArn:
        Value: !GetAtt SubmissionsTable.Arn
        Export:
            Name: {table_arn_export}
    FormUrl:
        Value: !GetAtt HandlerUrl.FunctionUrl
",
        table_name_export = naming::export_name(&name, "SubmissionsTableName"),
        table_arn_export = naming::export_name(&name, "SubmissionsTableArn"),
    );

    let mut stack = Stack::new(name, template);
    stack.capabilities = vec!["CAPABILITY_IAM"];
    stack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageName;

    fn stage(name: StageName) -> StageConfig {
        StageConfig {
            name,
            account: "111111111111".into(),
            region: "us-west-2".into(),
            is_production: name == StageName::Prod,
            domain: None,
        }
    }

    #[test]
    fn submissions_survive_in_prod_only() {
        let config = crate::config::test_support::config("frontend", None);

        let prod = synthesize(&config, &stage(StageName::Prod));
        assert!(prod.template.contains("DeletionPolicy: Retain"));

        let beta = synthesize(&config, &stage(StageName::Beta));
        assert!(beta.template.contains("DeletionPolicy: Delete"));
    }

    #[test]
    fn handler_env_carries_the_table_name() {
        let config = crate::config::test_support::config("frontend", None);
        let stack = synthesize(&config, &stage(StageName::Beta));

        assert!(stack.template.contains("TABLE_NAME: !Ref SubmissionsTable"));
        assert!(stack.template.contains("FunctionName: frontend-contact-beta"));
    }

    #[test]
    fn exports_the_table_for_the_service_grant() {
        let config = crate::config::test_support::config("frontend", None);
        let stack = synthesize(&config, &stage(StageName::Beta));

        assert!(stack
            .template
            .contains("Name: Betauswest2ContactFormStack-SubmissionsTableArn"));
    }
}
